//! Checks that must pass before anything is created.

use std::ffi::OsStr;
use std::os::unix::fs::PermissionsExt;
use std::path::{Path, PathBuf};

use ssh_key::{HashAlg, PublicKey};

use crate::config::LaunchConfig;
use crate::error::MpvmError;

pub const MULTIPASS: &str = "multipass";

/// Outcome of a successful preflight.
#[derive(Debug, Clone)]
pub struct Preflight {
    /// Resolved location of the `multipass` executable.
    pub multipass: PathBuf,
    pub public_key: PublicKey,
}

pub fn run(config: &LaunchConfig) -> Result<Preflight, MpvmError> {
    let multipass = require_tool(MULTIPASS)?;
    let public_key = validate_ssh_key(&config.ssh_key_path)?;
    Ok(Preflight {
        multipass,
        public_key,
    })
}

/// Resolve `tool` on the current `PATH`.
pub fn require_tool(tool: &str) -> Result<PathBuf, MpvmError> {
    let path = std::env::var_os("PATH").unwrap_or_default();
    let found = find_executable(tool, &path).ok_or_else(|| MpvmError::ToolNotInstalled {
        tool: tool.to_string(),
    })?;
    tracing::debug!(tool, path = %found.display(), "found executable");
    Ok(found)
}

/// First executable regular file named `name` in a `PATH`-style list.
pub fn find_executable(name: &str, path: &OsStr) -> Option<PathBuf> {
    std::env::split_paths(path)
        .filter(|dir| !dir.as_os_str().is_empty())
        .map(|dir| dir.join(name))
        .find(|candidate| is_executable(candidate))
}

fn is_executable(path: &Path) -> bool {
    path.metadata()
        .is_ok_and(|m| m.is_file() && m.permissions().mode() & 0o111 != 0)
}

/// Parse the file as a single OpenSSH public key.
pub fn validate_ssh_key(path: &Path) -> Result<PublicKey, MpvmError> {
    let invalid = |message: String| MpvmError::InvalidSshKey {
        path: path.display().to_string(),
        message,
    };

    let contents = std::fs::read_to_string(path).map_err(|e| invalid(e.to_string()))?;
    let key = PublicKey::from_openssh(contents.trim()).map_err(|e| invalid(e.to_string()))?;

    tracing::info!(
        path = %path.display(),
        algorithm = %key.algorithm(),
        fingerprint = %key.fingerprint(HashAlg::Sha256),
        "SSH public key validated"
    );
    Ok(key)
}
