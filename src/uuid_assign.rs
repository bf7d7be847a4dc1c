//! Stable UUIDs for containers
//!
//! The runtime has no notion of a UUID, so one is generated on first sight
//! and appended to the container config as a comment line the OpenVZ tools
//! ignore:
//!
//! ```text
//! #UUID: 8509f80e-4a3b-4ac4-8b2a-5d3b1b2f9c42
//! ```

use std::sync::Arc;

use uuid::Uuid;

use crate::conf_file::ConfigStore;
use crate::{Error, Result};

/// Marker word of the UUID comment line
pub const UUID_MARKER: &str = "#UUID:";

/// Source of fresh UUIDs
pub trait UuidSource: Send + Sync {
    fn generate(&self) -> std::io::Result<Uuid>;
}

/// Random (v4) UUIDs from the OS entropy source
#[derive(Debug, Default, Clone, Copy)]
pub struct RandomUuid;

impl UuidSource for RandomUuid {
    fn generate(&self) -> std::io::Result<Uuid> {
        Ok(Uuid::new_v4())
    }
}

/// Outcome of [`UuidAssigner::scan_and_assign_all`]
#[derive(Debug, Default)]
pub struct AssignReport {
    /// Containers that already carried a UUID
    pub existing: Vec<(i32, Uuid)>,
    /// Containers that received a new UUID
    pub assigned: Vec<(i32, Uuid)>,
    /// Containers skipped because of an error
    pub failed: Vec<(i32, Error)>,
}

impl AssignReport {
    pub fn total(&self) -> usize {
        self.existing.len() + self.assigned.len() + self.failed.len()
    }
}

pub struct UuidAssigner {
    store: ConfigStore,
    uuids: Arc<dyn UuidSource>,
}

impl UuidAssigner {
    pub fn new(store: ConfigStore) -> Self {
        Self {
            store,
            uuids: Arc::new(RandomUuid),
        }
    }

    pub fn with_uuid_source(mut self, uuids: Arc<dyn UuidSource>) -> Self {
        self.uuids = uuids;
        self
    }

    pub fn store(&self) -> &ConfigStore {
        &self.store
    }

    /// UUID recorded in the config of `vpsid`, if any
    pub fn lookup(&self, vpsid: i32) -> Result<Option<Uuid>> {
        match self.store.find_record(vpsid, UUID_MARKER)? {
            None => Ok(None),
            Some(text) => Uuid::parse_str(&text)
                .map(Some)
                .map_err(|_| Error::MalformedUuid { vpsid, value: text }),
        }
    }

    /// UUID of `vpsid`, generating and recording one if the config has none.
    pub fn ensure_uuid(&self, vpsid: i32) -> Result<Uuid> {
        self.ensure(vpsid).map(|(uuid, _)| uuid)
    }

    /// Recorded UUID of `vpsid`, or a freshly generated one that is not
    /// written anywhere yet. The flag is `true` for a fresh UUID, which the
    /// caller persists with [`UuidAssigner::record`].
    pub fn resolve(&self, vpsid: i32) -> Result<(Uuid, bool)> {
        match self.lookup(vpsid)? {
            Some(uuid) => Ok((uuid, false)),
            None => {
                let uuid = self.uuids.generate().map_err(Error::UuidGeneration)?;
                Ok((uuid, true))
            }
        }
    }

    /// Append the UUID record for `vpsid` to its config.
    pub fn record(&self, vpsid: i32, uuid: Uuid) -> Result<()> {
        self.store
            .append_raw(vpsid, &format!("\n{} {}\n", UUID_MARKER, uuid.hyphenated()))?;
        tracing::info!(vpsid, uuid = %uuid, "Assigned UUID to container");
        Ok(())
    }

    /// Returns the UUID and whether it was newly assigned.
    fn ensure(&self, vpsid: i32) -> Result<(Uuid, bool)> {
        let (uuid, fresh) = self.resolve(vpsid)?;
        if fresh {
            self.record(vpsid, uuid)?;
        }
        Ok((uuid, fresh))
    }

    /// Make sure every container config in the directory carries a UUID.
    ///
    /// Each config is handled on its own: a failure is logged and recorded in
    /// the report, and the scan goes on with the next file.
    pub fn scan_and_assign_all(&self) -> Result<AssignReport> {
        let mut report = AssignReport::default();

        for vpsid in self.store.conf_ids()? {
            match self.ensure(vpsid) {
                Ok((uuid, true)) => report.assigned.push((vpsid, uuid)),
                Ok((uuid, false)) => report.existing.push((vpsid, uuid)),
                Err(e) => {
                    tracing::warn!(vpsid, error = %e, "Skipping container config");
                    report.failed.push((vpsid, e));
                }
            }
        }

        tracing::info!(
            assigned = report.assigned.len(),
            existing = report.existing.len(),
            failed = report.failed.len(),
            "UUID scan finished"
        );
        Ok(report)
    }
}
