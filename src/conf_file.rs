//! Per-VE flat config files (`<vpsid>.conf`)

use std::fs::{File, OpenOptions};
use std::io::{BufRead, BufReader, Read, Write};
use std::path::{Path, PathBuf};

use crate::{Error, Result};

/// Directories probed for config files, in order.
pub const DEFAULT_CONF_DIRS: &[&str] = &["/etc/vz/conf", "/usr/local/etc/conf"];

/// Longest accepted line, newline included.
pub const MAX_LINE_LEN: usize = 4096;

const VALUE_DELIMITERS: &[char] = &['"', '\t', '=', '\n'];

/// Access to the config files of one config directory
#[derive(Debug, Clone)]
pub struct ConfigStore {
    dir: PathBuf,
}

impl ConfigStore {
    /// Use the first existing directory out of `candidates`.
    pub fn locate<P: AsRef<Path>>(candidates: &[P]) -> Result<Self> {
        for candidate in candidates {
            let dir: &Path = candidate.as_ref();
            if dir.exists() {
                tracing::debug!(dir = %dir.display(), "Using OpenVZ config directory");
                return Ok(Self::new(dir));
            }
        }

        Err(Error::NoConfigDir(
            candidates
                .iter()
                .map(|p| AsRef::<Path>::as_ref(p).to_path_buf())
                .collect(),
        ))
    }

    /// Use `dir` as is, without probing
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    pub fn conf_path(&self, vpsid: i32) -> PathBuf {
        self.dir.join(format!("{}.conf", vpsid))
    }

    /// Value of `param` in the config of `vpsid`; the last assignment in the file wins.
    ///
    /// Both `PARAM=value` and `PARAM="value"` are understood. Lines are
    /// decoded lossily: bytes that are not UTF-8 come back as U+FFFD, so a
    /// stray Latin-1 comment does not make the whole file unreadable.
    pub fn find_param(&self, vpsid: i32, param: &str) -> Result<Option<String>> {
        let mut value = None;
        self.scan(vpsid, |line| {
            if let Some(v) = param_value(line, param) {
                value = Some(v.to_string());
            }
            true
        })?;
        Ok(value)
    }

    /// Second word of the first line whose first word is `marker`.
    pub fn find_record(&self, vpsid: i32, marker: &str) -> Result<Option<String>> {
        let mut record = None;
        self.scan(vpsid, |line| {
            let mut words = line.split_whitespace();
            if words.next() == Some(marker) {
                record = Some(words.next().unwrap_or("").to_string());
                return false;
            }
            true
        })?;
        Ok(record)
    }

    /// Append `text` to the config of `vpsid` with a single write.
    pub fn append_raw(&self, vpsid: i32, text: &str) -> Result<()> {
        let path = self.conf_path(vpsid);
        let mut file = OpenOptions::new().append(true).open(&path)?;
        file.write_all(text.as_bytes())?;
        file.sync_data()?;
        Ok(())
    }

    /// Ids of all `<n>.conf` files, `0.conf` (the host) excluded, ascending.
    pub fn conf_ids(&self) -> Result<Vec<i32>> {
        let mut ids = Vec::new();
        for entry in std::fs::read_dir(&self.dir)? {
            let entry = entry?;
            let name = entry.file_name();
            let Some(id) = name
                .to_str()
                .and_then(|n| n.strip_suffix(".conf"))
                .and_then(|stem| stem.parse::<i32>().ok())
            else {
                continue;
            };
            if id > 0 {
                ids.push(id);
            }
        }
        ids.sort_unstable();
        Ok(ids)
    }

    /// Feed every line of the config to `visit` until it returns `false`.
    /// Invalid UTF-8 is replaced, not rejected.
    fn scan(&self, vpsid: i32, mut visit: impl FnMut(&str) -> bool) -> Result<()> {
        let path = self.conf_path(vpsid);
        let mut reader = BufReader::new(File::open(&path)?);
        let mut buf = Vec::with_capacity(256);

        loop {
            buf.clear();
            let n = reader
                .by_ref()
                .take(MAX_LINE_LEN as u64 + 1)
                .read_until(b'\n', &mut buf)?;
            if n == 0 {
                return Ok(());
            }
            if n > MAX_LINE_LEN {
                return Err(Error::LineTooLong {
                    path,
                    limit: MAX_LINE_LEN,
                });
            }
            let line = String::from_utf8_lossy(&buf);
            if !visit(&*line) {
                return Ok(());
            }
        }
    }
}

/// Value assigned to `param` on `line`, if the line is such an assignment.
fn param_value<'a>(line: &'a str, param: &str) -> Option<&'a str> {
    let rest = line.strip_prefix(param)?;
    if !rest.starts_with('=') {
        return None;
    }
    rest.split(VALUE_DELIMITERS).find(|token| !token.is_empty())
}
