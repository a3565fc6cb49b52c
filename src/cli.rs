use clap::{Parser, ValueEnum};
use std::path::PathBuf;

#[derive(Parser, Debug)]
#[command(
    name = "mpvm",
    about = "Launch a multipass instance and wire it up for SSH",
    after_help = "Arguments after `--` are passed verbatim to `multipass launch`,\n\
                  e.g. `mpvm -- --name demo --cpus 2`."
)]
pub struct Cli {
    /// SSH public key to install in the instance [default: ~/.ssh/id_rsa.pub]
    #[arg(long, value_name = "PATH")]
    pub ssh_key: Option<PathBuf>,

    /// What to do when a post-launch step fails; either way a failed step
    /// makes the run exit with status 1
    #[arg(long, value_enum, default_value_t = StepPolicy::Continue)]
    pub on_step_failure: StepPolicy,

    /// Enable verbose output
    #[arg(short, long)]
    pub verbose: bool,

    /// Options forwarded to `multipass launch`
    #[arg(last = true, value_name = "LAUNCH_ARGS")]
    pub launch_args: Vec<String>,
}

/// Handling of post-launch step failures.
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum StepPolicy {
    /// Run every step, then fail if any of them failed.
    Continue,
    /// Stop at the first failed step.
    Abort,
}
