//! Host blocks in the SSH client configuration file.
//!
//! OpenSSH takes the first value it obtains for each option, so a new block
//! is prepended: it shadows any stale entry left behind by an earlier
//! instance with the same name.

use std::fmt;
use std::net::Ipv4Addr;
use std::path::Path;

use crate::error::MpvmError;

/// Login user of the stock Ubuntu images multipass launches.
pub const LOGIN_USER: &str = "ubuntu";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HostBlock {
    pub alias: String,
    pub hostname: String,
    pub user: String,
}

impl HostBlock {
    pub fn for_instance(name: &str, addr: Ipv4Addr) -> Self {
        Self {
            alias: name.to_string(),
            hostname: addr.to_string(),
            user: LOGIN_USER.to_string(),
        }
    }
}

impl fmt::Display for HostBlock {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "Host {}\n  HostName {}\n  User {}\n",
            self.alias, self.hostname, self.user
        )
    }
}

/// New file contents: `block`, a blank line, then `existing` untouched.
pub fn prepend(existing: &str, block: &HostBlock) -> String {
    format!("{block}\n{existing}")
}

/// Prepend `block` to the config at `path`, creating the file (and its
/// directory) when absent.
pub fn prepend_to_file(path: &Path, block: &HostBlock) -> Result<(), MpvmError> {
    let existing = match std::fs::read_to_string(path) {
        Ok(s) => s,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => String::new(),
        Err(e) => {
            return Err(MpvmError::Io {
                context: format!("reading {}", path.display()),
                source: e,
            });
        }
    };

    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent).map_err(|e| MpvmError::Io {
            context: format!("creating directory {}", parent.display()),
            source: e,
        })?;
    }

    // Replace the file a symlink points to, not the link itself.
    let target = match std::fs::canonicalize(path) {
        Ok(real) => real,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => path.to_path_buf(),
        Err(e) => {
            return Err(MpvmError::Io {
                context: format!("resolving {}", path.display()),
                source: e,
            });
        }
    };

    replace_file(&target, prepend(&existing, block).as_bytes())?;

    tracing::info!(path = %target.display(), alias = %block.alias, "SSH host block added");
    Ok(())
}

/// Write `contents` to a `.part` sibling, then rename it over `target` so a
/// failed write never leaves a truncated file behind.
fn replace_file(target: &Path, contents: &[u8]) -> Result<(), MpvmError> {
    let mut tmp_name = target.file_name().unwrap_or_default().to_os_string();
    tmp_name.push(".part");
    let tmp_path = target.with_file_name(tmp_name);

    let written = std::fs::write(&tmp_path, contents)
        .and_then(|()| match std::fs::metadata(target) {
            Ok(meta) => std::fs::set_permissions(&tmp_path, meta.permissions()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(e),
        })
        .map_err(|e| MpvmError::Io {
            context: format!("writing {}", tmp_path.display()),
            source: e,
        });
    if let Err(e) = written {
        let _ = std::fs::remove_file(&tmp_path);
        return Err(e);
    }

    std::fs::rename(&tmp_path, target).map_err(|e| {
        let _ = std::fs::remove_file(&tmp_path);
        MpvmError::Io {
            context: format!("renaming {} to {}", tmp_path.display(), target.display()),
            source: e,
        }
    })
}
