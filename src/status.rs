//! Runtime status listing (`vzlist`)

use std::path::PathBuf;
use std::process::Command;

use crate::models::VmStatus;
use crate::{Error, Result};

/// One row of the runtime listing
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StatusRow {
    pub vpsid: i32,
    /// Raw status column, e.g. `running` or `stopped`
    pub token: String,
}

impl StatusRow {
    pub fn new(vpsid: i32, token: impl Into<String>) -> Self {
        Self {
            vpsid,
            token: token.into(),
        }
    }

    pub fn status(&self) -> VmStatus {
        VmStatus::from_vzlist(&self.token)
    }
}

/// Anything able to list the containers known to the runtime
#[cfg_attr(test, mockall::automock)]
pub trait StatusSource: Send + Sync {
    fn list(&self) -> Result<Vec<StatusRow>>;
}

/// Parse `vzlist -a -ovpsid,status -H` output, one `<id> <status>` per line.
pub fn parse_listing(output: &str) -> Result<Vec<StatusRow>> {
    output
        .lines()
        .filter(|line| !line.trim().is_empty())
        .map(|line| {
            let mut cols = line.split_whitespace();
            match (cols.next(), cols.next(), cols.next()) {
                (Some(id), Some(token), None) => id
                    .parse::<i32>()
                    .map(|vpsid| StatusRow::new(vpsid, token))
                    .map_err(|_| Error::MalformedStatus(line.to_string())),
                _ => Err(Error::MalformedStatus(line.to_string())),
            }
        })
        .collect()
}

/// Status source backed by the `vzlist` binary
#[derive(Debug, Clone)]
pub struct VzList {
    binary: PathBuf,
}

impl VzList {
    pub fn new(binary: impl Into<PathBuf>) -> Self {
        Self {
            binary: binary.into(),
        }
    }
}

impl StatusSource for VzList {
    fn list(&self) -> Result<Vec<StatusRow>> {
        let output = Command::new(&self.binary)
            .args(["-a", "-ovpsid,status", "-H"])
            .output()?;

        if !output.status.success() {
            return Err(Error::Command(format!(
                "{} exited with {}: {}",
                self.binary.display(),
                output.status,
                String::from_utf8_lossy(&output.stderr).trim()
            )));
        }

        parse_listing(&String::from_utf8_lossy(&output.stdout))
    }
}
