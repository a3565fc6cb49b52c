//! Post-launch configuration of a new instance.

use std::path::Path;

use ssh_key::PublicKey;

use crate::backend::Backend;
use crate::cli::StepPolicy;
use crate::config::LaunchConfig;
use crate::error::MpvmError;
use crate::launch::Instance;
use crate::progress::StepProgress;
use crate::ssh_config::{self, HostBlock};

/// inotify watch limit for editors and file watchers that track large trees.
pub const MAX_USER_WATCHES: u32 = 524_288;

const SYSCTL_CONF: &str = "/etc/sysctl.conf";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConfigureStep {
    WatchLimit,
    SshKey,
    SshConfig,
}

impl ConfigureStep {
    pub const ALL: [ConfigureStep; 3] = [
        ConfigureStep::WatchLimit,
        ConfigureStep::SshKey,
        ConfigureStep::SshConfig,
    ];

    pub fn label(self) -> &'static str {
        match self {
            ConfigureStep::WatchLimit => "Raising file watch limit",
            ConfigureStep::SshKey => "Installing SSH key",
            ConfigureStep::SshConfig => "Updating SSH config",
        }
    }

    fn short_name(self) -> &'static str {
        match self {
            ConfigureStep::WatchLimit => "file watch limit",
            ConfigureStep::SshKey => "SSH key",
            ConfigureStep::SshConfig => "SSH config",
        }
    }
}

/// Append the watch limit to the instance's sysctl config and reload it.
pub async fn raise_watch_limit<B: Backend>(backend: &B, instance: &Instance) -> Result<(), MpvmError> {
    let line = format!("fs.inotify.max_user_watches={MAX_USER_WATCHES}\n");
    backend
        .exec(&instance.name, &["sudo", "tee", "-a", SYSCTL_CONF], Some(line.as_bytes()))
        .await?;
    backend
        .exec(&instance.name, &["sudo", "sysctl", "-p"], None)
        .await
}

/// Append the public key to the login user's `authorized_keys`.
///
/// The key travels on stdin, re-encoded from its parsed form.
pub async fn install_ssh_key<B: Backend>(
    backend: &B,
    instance: &Instance,
    key: &PublicKey,
) -> Result<(), MpvmError> {
    let mut line = key.to_openssh().map_err(|e| MpvmError::Validation {
        message: format!("cannot encode SSH key: {e}"),
    })?;
    line.push('\n');

    let authorized_keys = format!("/home/{}/.ssh/authorized_keys", ssh_config::LOGIN_USER);
    backend
        .exec(&instance.name, &["tee", "-a", authorized_keys.as_str()], Some(line.as_bytes()))
        .await
}

/// Look up the instance address and prepend a host block for it.
///
/// The address is recorded on `instance` only once the block is written.
pub async fn update_ssh_config<B: Backend>(
    backend: &B,
    instance: &mut Instance,
    ssh_config_path: &Path,
) -> Result<HostBlock, MpvmError> {
    let addr = backend.ipv4(&instance.name).await?;
    let block = HostBlock::for_instance(&instance.name, addr);
    ssh_config::prepend_to_file(ssh_config_path, &block)?;
    instance.ipv4 = Some(addr);
    Ok(block)
}

/// Run all post-launch steps under the configured [`StepPolicy`].
///
/// Any failed step fails the run; `Continue` still attempts the rest first.
pub async fn run<B: Backend>(
    backend: &B,
    config: &LaunchConfig,
    instance: &mut Instance,
    key: &PublicKey,
    progress: &mut StepProgress,
) -> Result<(), MpvmError> {
    let mut failed = Vec::new();

    for (i, step) in ConfigureStep::ALL.into_iter().enumerate() {
        let current = &mut *instance;
        let result = progress
            .run(step.label(), |s| async move {
                let result = match step {
                    ConfigureStep::WatchLimit => raise_watch_limit(backend, current).await,
                    ConfigureStep::SshKey => install_ssh_key(backend, current, key).await,
                    ConfigureStep::SshConfig => {
                        update_ssh_config(backend, current, &config.ssh_config_path)
                            .await
                            .map(|block| {
                                s.set_done_label(format!("Host {} -> {}", block.alias, block.hostname));
                            })
                    }
                };
                if let Err(e) = &result {
                    s.log(&e.to_string());
                }
                result
            })
            .await;

        if let Err(e) = result {
            tracing::warn!(step = step.short_name(), error = %e, "post-launch step failed");
            failed.push(step.short_name());
            if config.step_policy == StepPolicy::Abort {
                let skipped = ConfigureStep::ALL.len() - i - 1;
                if skipped > 0 {
                    tracing::warn!(skipped, "aborting remaining post-launch steps");
                }
                break;
            }
        }
    }

    if failed.is_empty() {
        Ok(())
    } else {
        Err(MpvmError::ConfigureFailed {
            steps: failed.join(", "),
        })
    }
}
