//! Instance creation: default sizing, invocation, and output parsing.

use std::net::Ipv4Addr;

use crate::backend::Backend;
use crate::config::LaunchConfig;
use crate::error::MpvmError;

/// Sizing applied before any user option. Larger than multipass's own
/// defaults (1 CPU, 5G disk, 1G memory).
pub const DEFAULT_CPUS: &str = "4";
pub const DEFAULT_DISK: &str = "20G";
pub const DEFAULT_MEMORY: &str = "8G";

const LAUNCHED_MARKER: &str = "Launched:";

/// A freshly created instance.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Instance {
    pub name: String,
    /// Known once the SSH config step has registered the instance.
    pub ipv4: Option<Ipv4Addr>,
}

/// Full `multipass launch` options: defaults first, pass-through after.
///
/// multipass keeps the last value of a repeated option, so anything the
/// user passes overrides the defaults. Keep this order.
pub fn launch_options(passthrough: &[String]) -> Vec<String> {
    let mut args: Vec<String> = [
        "--cpus",
        DEFAULT_CPUS,
        "--disk",
        DEFAULT_DISK,
        "--memory",
        DEFAULT_MEMORY,
    ]
    .into_iter()
    .map(String::from)
    .collect();
    args.extend(passthrough.iter().cloned());
    args
}

/// Find the `Launched: <name>` announcement in launch output.
///
/// Lines are split on `\r` too, since multipass redraws its spinner in place.
pub fn parse_launched_name(output: &str) -> Option<String> {
    output
        .split(['\n', '\r'])
        .filter_map(|line| {
            let (_, rest) = line.split_once(LAUNCHED_MARKER)?;
            rest.split_whitespace().next()
        })
        .next()
        .map(String::from)
}

pub async fn launch_instance<B: Backend>(
    backend: &B,
    config: &LaunchConfig,
    log: impl Fn(&str),
) -> Result<Instance, MpvmError> {
    let args = launch_options(&config.launch_args);
    let output = backend.launch(&args).await?;

    for line in output.lines().map(str::trim).filter(|l| !l.is_empty()) {
        tracing::debug!(target: "mpvm::launch", "{line}");
        log(line);
    }

    let name = parse_launched_name(&output).ok_or_else(|| MpvmError::LaunchFailed {
        message: "no `Launched:` line in multipass output".into(),
    })?;

    tracing::info!(name, "instance launched");
    Ok(Instance { name, ipv4: None })
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;

    /// Value multipass ends up using for `flag`: the last occurrence wins.
    fn effective<'a>(args: &'a [String], flag: &str) -> Option<&'a str> {
        args.windows(2)
            .filter(|w| w[0] == flag)
            .map(|w| w[1].as_str())
            .last()
    }

    fn strings(v: &[&str]) -> Vec<String> {
        v.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn defaults_without_passthrough() {
        assert_eq!(
            launch_options(&[]),
            ["--cpus", "4", "--disk", "20G", "--memory", "8G"]
        );
    }

    #[test]
    fn passthrough_follows_defaults() {
        let args = launch_options(&strings(&["--name", "demo", "--cpus", "2"]));
        assert_eq!(
            args,
            ["--cpus", "4", "--disk", "20G", "--memory", "8G", "--name", "demo", "--cpus", "2"]
        );
        assert_eq!(effective(&args, "--cpus"), Some("2"));
        assert_eq!(effective(&args, "--memory"), Some("8G"));
        assert_eq!(effective(&args, "--name"), Some("demo"));
    }

    #[test]
    fn every_resource_default_can_be_overridden() {
        for (flag, value) in [("--cpus", "1"), ("--disk", "50G"), ("--memory", "2G")] {
            let args = launch_options(&strings(&[flag, value]));
            assert_eq!(effective(&args, flag), Some(value), "{flag}");
        }
    }

    #[test]
    fn passthrough_is_forwarded_verbatim() {
        let odd = strings(&["noble", "--cloud-init", "-", "--mount", "/a b:/c"]);
        let args = launch_options(&odd);
        assert_eq!(&args[6..], odd.as_slice());
    }

    #[test]
    fn parses_launched_line() {
        let out = "Retrieving image: 100%\nLaunched: demo\n";
        assert_eq!(parse_launched_name(out).as_deref(), Some("demo"));
    }

    #[test]
    fn parses_launched_line_after_spinner_redraws() {
        let out = "\r/ Launching primary\r- Starting vast-owl\r\u{1b}[2KLaunched: vast-owl   \n";
        assert_eq!(parse_launched_name(out).as_deref(), Some("vast-owl"));
    }

    #[test]
    fn empty_output_yields_no_name() {
        assert_eq!(parse_launched_name(""), None);
        assert_eq!(parse_launched_name("launch failed: timed out\n"), None);
        assert_eq!(parse_launched_name("Launched:   \n"), None);
    }

    struct ScriptedLaunch {
        output: String,
        seen: Mutex<Vec<String>>,
    }

    impl Backend for ScriptedLaunch {
        async fn launch(&self, args: &[String]) -> Result<String, MpvmError> {
            *self.seen.lock().unwrap() = args.to_vec();
            Ok(self.output.clone())
        }

        async fn exec(&self, _: &str, _: &[&str], _: Option<&[u8]>) -> Result<(), MpvmError> {
            unreachable!("launch never runs remote commands")
        }

        async fn ipv4(&self, _: &str) -> Result<Ipv4Addr, MpvmError> {
            unreachable!("launch never queries addresses")
        }
    }

    fn config(launch_args: &[&str]) -> LaunchConfig {
        LaunchConfig {
            ssh_key_path: "/tmp/key.pub".into(),
            launch_args: strings(launch_args),
            step_policy: crate::cli::StepPolicy::Continue,
            ssh_config_path: "/tmp/ssh_config".into(),
        }
    }

    #[tokio::test]
    async fn launch_instance_returns_name() {
        let backend = ScriptedLaunch {
            output: "Launched: demo\n".into(),
            seen: Mutex::new(Vec::new()),
        };
        let instance = launch_instance(&backend, &config(&["--name", "demo"]), |_| {})
            .await
            .unwrap();
        assert_eq!(instance.name, "demo");
        assert_eq!(instance.ipv4, None);
        assert_eq!(backend.seen.lock().unwrap().last().map(String::as_str), Some("demo"));
    }

    #[tokio::test]
    async fn launch_without_announcement_fails() {
        let backend = ScriptedLaunch {
            output: String::new(),
            seen: Mutex::new(Vec::new()),
        };
        let err = launch_instance(&backend, &config(&[]), |_| {}).await.unwrap_err();
        assert!(matches!(err, MpvmError::LaunchFailed { .. }));
    }
}
