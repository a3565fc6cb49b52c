use std::collections::BTreeMap;
use std::net::Ipv4Addr;
use std::path::PathBuf;
use std::process::{Output, Stdio};

use tokio::io::AsyncWriteExt;
use tokio::process::Command;

use crate::error::MpvmError;

/// Drives the `multipass` CLI. Every call is an argument array; nothing is
/// composed into a shell string.
pub struct MultipassBackend {
    program: PathBuf,
}

impl MultipassBackend {
    pub fn new(program: PathBuf) -> Self {
        Self { program }
    }

    fn command(&self) -> Command {
        let mut cmd = Command::new(&self.program);
        cmd.stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true);
        cmd
    }
}

impl super::Backend for MultipassBackend {
    async fn launch(&self, args: &[String]) -> Result<String, MpvmError> {
        tracing::info!(?args, "running multipass launch");
        let output = self
            .command()
            .arg("launch")
            .args(args)
            .output()
            .await
            .map_err(|e| MpvmError::Io {
                context: "running multipass launch".into(),
                source: e,
            })?;

        if !output.status.success() {
            return Err(MpvmError::LaunchFailed {
                message: failure_message(&output),
            });
        }

        let mut text = String::from_utf8_lossy(&output.stdout).into_owned();
        text.push('\n');
        text.push_str(&String::from_utf8_lossy(&output.stderr));
        Ok(text)
    }

    async fn exec(
        &self,
        instance: &str,
        argv: &[&str],
        stdin: Option<&[u8]>,
    ) -> Result<(), MpvmError> {
        let command = format!("multipass exec {instance} -- {}", argv.join(" "));
        tracing::debug!(%command, stdin_bytes = stdin.map_or(0, <[u8]>::len), "running");

        let mut cmd = self.command();
        cmd.arg("exec").arg(instance).arg("--").args(argv);
        if stdin.is_some() {
            cmd.stdin(Stdio::piped());
        }

        let mut child = cmd.spawn().map_err(|e| MpvmError::Io {
            context: format!("running {command}"),
            source: e,
        })?;

        if let Some(data) = stdin
            && let Some(mut pipe) = child.stdin.take()
        {
            match pipe.write_all(data).await {
                Ok(()) => {}
                // The remote side quit without reading; its stderr says why.
                Err(e) if e.kind() == std::io::ErrorKind::BrokenPipe => {
                    tracing::debug!(%command, "input closed before it was consumed");
                }
                Err(e) => {
                    return Err(MpvmError::Io {
                        context: format!("writing input to {command}"),
                        source: e,
                    });
                }
            }
            // Dropping the pipe closes it so the remote side sees EOF.
            drop(pipe);
        }

        let output = child.wait_with_output().await.map_err(|e| MpvmError::Io {
            context: format!("waiting for {command}"),
            source: e,
        })?;

        if !output.status.success() {
            return Err(MpvmError::ExternalCommand {
                command,
                message: failure_message(&output),
            });
        }
        Ok(())
    }

    async fn ipv4(&self, instance: &str) -> Result<Ipv4Addr, MpvmError> {
        let output = self
            .command()
            .args(["info", instance, "--format", "json"])
            .output()
            .await
            .map_err(|e| MpvmError::Io {
                context: "running multipass info".into(),
                source: e,
            })?;

        if !output.status.success() {
            return Err(MpvmError::InstanceInfo {
                name: instance.to_string(),
                message: failure_message(&output),
            });
        }

        parse_info_ipv4(&String::from_utf8_lossy(&output.stdout), instance)
    }
}

fn failure_message(output: &Output) -> String {
    let stderr = String::from_utf8_lossy(&output.stderr);
    let stderr = stderr.trim();
    if !stderr.is_empty() {
        return stderr.to_string();
    }
    let stdout = String::from_utf8_lossy(&output.stdout);
    match stdout.trim() {
        "" => format!("exited with {}", output.status),
        s => s.to_string(),
    }
}

// ── `multipass info --format json` ─────────────────────────

#[derive(Debug, Default, facet::Facet)]
#[facet(default)]
struct InfoReport {
    #[facet(default)]
    info: BTreeMap<String, InstanceInfo>,
}

#[derive(Debug, Default, facet::Facet)]
#[facet(default)]
struct InstanceInfo {
    #[facet(default)]
    state: String,
    #[facet(default)]
    ipv4: Vec<String>,
}

/// Extract the first IPv4 address of `instance` from `multipass info` JSON.
pub fn parse_info_ipv4(json: &str, instance: &str) -> Result<Ipv4Addr, MpvmError> {
    let err = |message: String| MpvmError::InstanceInfo {
        name: instance.to_string(),
        message,
    };

    let report: InfoReport =
        facet_json::from_str(json).map_err(|e| err(format!("unparseable info output: {e}")))?;

    let info = report
        .info
        .get(instance)
        .ok_or_else(|| err("instance missing from info output".into()))?;

    let addr = info
        .ipv4
        .iter()
        .find_map(|a| a.parse::<Ipv4Addr>().ok())
        .ok_or_else(|| err(format!("no IPv4 address assigned (state: {})", info.state)))?;

    tracing::debug!(instance, %addr, "resolved instance address");
    Ok(addr)
}

#[cfg(test)]
mod tests {
    use super::*;

    const INFO: &str = r#"{
    "errors": [],
    "info": {
        "demo": {
            "cpu_count": "4",
            "disks": { "sda1": { "total": "20616793600", "used": "1596875776" } },
            "image_release": "24.04 LTS",
            "ipv4": ["10.84.179.12", "172.17.0.1"],
            "memory": { "total": 8341057536, "used": 253194240 },
            "release": "Ubuntu 24.04 LTS",
            "state": "Running"
        }
    }
}"#;

    #[test]
    fn picks_first_ipv4() {
        assert_eq!(
            parse_info_ipv4(INFO, "demo").unwrap(),
            Ipv4Addr::new(10, 84, 179, 12)
        );
    }

    #[test]
    fn unknown_instance_is_an_error() {
        let err = parse_info_ipv4(INFO, "other").unwrap_err();
        assert!(err.to_string().contains("'other'"));
    }

    #[test]
    fn instance_without_address_is_an_error() {
        let json = r#"{"errors": [], "info": {"demo": {"ipv4": [], "state": "Starting"}}}"#;
        let err = parse_info_ipv4(json, "demo").unwrap_err();
        assert!(err.to_string().contains("Starting"));
    }

    #[test]
    fn garbage_output_is_an_error() {
        assert!(parse_info_ipv4("info failed", "demo").is_err());
    }

    #[tokio::test]
    async fn exec_reports_remote_stderr_when_input_is_refused() {
        use crate::backend::Backend;
        use std::os::unix::fs::PermissionsExt;

        let dir = tempfile::tempdir().unwrap();
        let program = dir.path().join("multipass");
        std::fs::write(
            &program,
            "#!/bin/sh\necho 'sudo: a password is required' >&2\nexit 1\n",
        )
        .unwrap();
        std::fs::set_permissions(&program, std::fs::Permissions::from_mode(0o755)).unwrap();

        // Larger than a pipe buffer, so the write hits the closed pipe.
        let payload = vec![b'x'; 1 << 20];
        let err = MultipassBackend::new(program)
            .exec("demo", &["sudo", "tee", "-a", "/etc/sysctl.conf"], Some(&payload))
            .await
            .unwrap_err();

        assert!(matches!(err, MpvmError::ExternalCommand { .. }), "{err}");
        assert!(err.to_string().contains("a password is required"));
    }
}
