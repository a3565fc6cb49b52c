use std::path::PathBuf;

use crate::error::MpvmError;

fn home_dir() -> Result<PathBuf, MpvmError> {
    dirs::home_dir().ok_or_else(|| MpvmError::Validation {
        message: "cannot determine the home directory".into(),
    })
}

/// Per-user SSH directory: `~/.ssh/`
pub fn ssh_dir() -> Result<PathBuf, MpvmError> {
    Ok(home_dir()?.join(".ssh"))
}

/// Public key installed when `--ssh-key` is not given: `~/.ssh/id_rsa.pub`
pub fn default_ssh_key_path() -> Result<PathBuf, MpvmError> {
    Ok(ssh_dir()?.join("id_rsa.pub"))
}

/// SSH client configuration file: `~/.ssh/config`
pub fn ssh_config_path() -> Result<PathBuf, MpvmError> {
    Ok(ssh_dir()?.join("config"))
}
