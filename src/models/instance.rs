//! Registry instance model

use super::Definition;
use serde::{Deserialize, Serialize};

/// Instance id of a container that is not running.
pub const NO_VPSID: i32 = -1;

/// Runtime status of an instance
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum VmStatus {
    Running,
    Shutoff,
}

impl std::fmt::Display for VmStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            VmStatus::Running => write!(f, "Running"),
            VmStatus::Shutoff => write!(f, "Shutoff"),
        }
    }
}

impl VmStatus {
    /// Map a vzlist status column; everything except `stopped` counts as running.
    pub fn from_vzlist(token: &str) -> Self {
        if token == "stopped" {
            VmStatus::Shutoff
        } else {
            VmStatus::Running
        }
    }
}

/// A container tracked by the registry
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Instance {
    /// Runtime id, [`NO_VPSID`] while not running
    pub id: i32,
    pub status: VmStatus,
    pub def: Definition,
}

impl Instance {
    /// New inactive instance owning `def`
    pub fn inactive(def: Definition) -> Self {
        Self {
            id: NO_VPSID,
            status: VmStatus::Shutoff,
            def,
        }
    }

    /// Instance as reported by the runtime listing
    pub fn from_status(vpsid: i32, status: VmStatus, def: Definition) -> Self {
        let id = match status {
            VmStatus::Running => vpsid,
            VmStatus::Shutoff => NO_VPSID,
        };
        Self { id, status, def }
    }

    pub fn is_active(&self) -> bool {
        self.status == VmStatus::Running
    }

    pub fn name(&self) -> &str {
        &self.def.name
    }
}
