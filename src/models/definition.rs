//! Container definition model

use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Size of the name field of a definition, terminator included.
pub const NAME_MAX: usize = 8;
/// Size of the template name field, terminator included.
pub const TEMPLATE_MAX: usize = 256;
/// VPS ids at or below this value belong to the host.
pub const RESERVED_ID_LIMIT: i64 = 100;

/// Filesystem section of a definition
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct FsDef {
    /// OS template the private area is created from
    pub template: String,
    /// Disk space limit in blocks, 0 when unset
    pub disk_size: u64,
    /// Disk inode limit, 0 when unset
    pub disk_inodes: u64,
}

impl FsDef {
    /// Store a template name, cut to the bounded field width.
    pub fn set_template(&mut self, name: &str) {
        self.template = truncate(name, TEMPLATE_MAX - 1).to_string();
    }
}

/// A validated container definition
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Definition {
    /// VPS id in textual form
    pub name: String,
    pub uuid: Uuid,
    /// Virtual CPU count, 0 means the runtime default
    pub vcpus: u32,
    pub fs: FsDef,
    /// Network interfaces in document order
    pub net: Vec<super::NetInterface>,
}

impl Definition {
    pub fn new(name: impl Into<String>, uuid: Uuid) -> Self {
        Self {
            name: name.into(),
            uuid,
            vcpus: 0,
            fs: FsDef::default(),
            net: Vec::new(),
        }
    }

    /// Minimal definition for a container known only from the runtime listing.
    pub fn skeleton(vpsid: i32, uuid: Uuid) -> Self {
        Self::new(vpsid.to_string(), uuid)
    }

    /// A skeleton carries neither filesystem nor network data.
    pub fn is_skeleton(&self) -> bool {
        self.fs == FsDef::default() && self.net.is_empty()
    }

    pub fn with_vcpus(mut self, vcpus: u32) -> Self {
        self.vcpus = vcpus;
        self
    }

    pub fn with_fs(mut self, fs: FsDef) -> Self {
        self.fs = fs;
        self
    }
}

/// Longest prefix of `s` that fits in `max` bytes without splitting a character.
pub(crate) fn truncate(s: &str, max: usize) -> &str {
    if s.len() <= max {
        return s;
    }
    let mut end = max;
    while !s.is_char_boundary(end) {
        end -= 1;
    }
    &s[..end]
}
