use std::path::PathBuf;

use crate::cli::{Cli, StepPolicy};
use crate::error::MpvmError;
use crate::paths;

/// Everything a run needs, resolved once from the command line.
#[derive(Debug, Clone)]
pub struct LaunchConfig {
    /// Public key installed into the instance's `authorized_keys`.
    pub ssh_key_path: PathBuf,
    /// Forwarded verbatim to `multipass launch`, after the default sizing.
    pub launch_args: Vec<String>,
    pub step_policy: StepPolicy,
    /// Host SSH client config that receives the new host block.
    pub ssh_config_path: PathBuf,
}

impl LaunchConfig {
    pub fn from_cli(cli: Cli) -> Result<Self, MpvmError> {
        let ssh_key_path = match cli.ssh_key {
            Some(path) => path,
            None => paths::default_ssh_key_path()?,
        };

        Ok(Self {
            ssh_key_path,
            launch_args: cli.launch_args,
            step_policy: cli.on_step_failure,
            ssh_config_path: paths::ssh_config_path()?,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::Parser;

    #[test]
    fn explicit_key_path_is_kept() {
        let cli = Cli::try_parse_from(["mpvm", "--ssh-key", "/tmp/key.pub", "--", "--name", "demo"])
            .unwrap();
        let config = LaunchConfig::from_cli(cli).unwrap();
        assert_eq!(config.ssh_key_path, PathBuf::from("/tmp/key.pub"));
        assert_eq!(config.launch_args, ["--name", "demo"]);
        assert!(config.ssh_config_path.ends_with(".ssh/config"));
    }

    #[test]
    fn key_path_defaults_to_id_rsa() {
        let cli = Cli::try_parse_from(["mpvm"]).unwrap();
        let config = LaunchConfig::from_cli(cli).unwrap();
        assert!(config.ssh_key_path.ends_with(".ssh/id_rsa.pub"));
        assert_eq!(config.step_policy, StepPolicy::Continue);
    }
}
