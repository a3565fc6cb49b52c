//! Whole-run orchestration.
//!
//! `Validating → Launching → Configuring → Done`, or `Failed` from any of
//! the first three. A validation or launch failure ends the run before
//! anything else happens; once the instance exists, configuration follows
//! the step policy.

use std::fmt;

use ssh_key::PublicKey;

use crate::backend::Backend;
use crate::backend::multipass::MultipassBackend;
use crate::config::LaunchConfig;
use crate::error::MpvmError;
use crate::launch::{self, Instance};
use crate::progress::{OutputMode, StepProgress};
use crate::{configure, preflight};

/// Preflight + launch + the post-launch steps.
const TOTAL_STEPS: usize = 2 + configure::ConfigureStep::ALL.len();

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Phase {
    Validating,
    Launching,
    Configuring,
    Done,
    Failed,
}

impl fmt::Display for Phase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Phase::Validating => "validating",
            Phase::Launching => "launching",
            Phase::Configuring => "configuring",
            Phase::Done => "done",
            Phase::Failed => "failed",
        };
        f.write_str(s)
    }
}

fn enter(phase: Phase) {
    tracing::debug!(%phase, "entering phase");
}

fn fail(from: Phase, error: &MpvmError) {
    tracing::debug!(%from, %error, "run failed");
    enter(Phase::Failed);
}

pub async fn run(config: &LaunchConfig, mode: OutputMode) -> Result<Instance, MpvmError> {
    let mut progress = StepProgress::new(TOTAL_STEPS, mode);

    enter(Phase::Validating);
    let checked = progress
        .run("Checking prerequisites", |step| async move {
            let checked = preflight::run(config)?;
            step.set_done_label(format!(
                "Prerequisites ok ({})",
                checked.public_key.fingerprint(ssh_key::HashAlg::Sha256)
            ));
            Ok::<_, MpvmError>(checked)
        })
        .await
        .inspect_err(|e| fail(Phase::Validating, e))?;

    let backend = MultipassBackend::new(checked.multipass);
    provision(&backend, config, &checked.public_key, &mut progress).await
}

/// Launch and configure an instance once preflight has passed.
pub async fn provision<B: Backend>(
    backend: &B,
    config: &LaunchConfig,
    key: &PublicKey,
    progress: &mut StepProgress,
) -> Result<Instance, MpvmError> {
    enter(Phase::Launching);
    let mut instance = progress
        .run("Launching instance", |step| async move {
            let instance = launch::launch_instance(backend, config, |line| step.log(line)).await?;
            step.set_done_label(format!("Launched {}", instance.name));
            Ok::<_, MpvmError>(instance)
        })
        .await
        .inspect_err(|e| fail(Phase::Launching, e))?;

    enter(Phase::Configuring);
    configure::run(backend, config, &mut instance, key, progress)
        .await
        .inspect_err(|e| fail(Phase::Configuring, e))?;

    enter(Phase::Done);
    report_ready(progress, &instance);
    Ok(instance)
}

fn report_ready(progress: &StepProgress, instance: &Instance) {
    if let Some(addr) = instance.ipv4 {
        tracing::info!(name = %instance.name, %addr, "instance ready");
    }
    let command = format!("ssh {}", instance.name);
    let command = if progress.mode() == OutputMode::Plain {
        command
    } else {
        console::style(command).bold().to_string()
    };
    progress.println(&format!(
        "Instance '{}' is ready. Connect with: {command}",
        instance.name
    ));
}
