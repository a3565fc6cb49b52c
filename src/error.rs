use miette::Diagnostic;
use thiserror::Error;

#[derive(Debug, Error, Diagnostic)]
pub enum MpvmError {
    #[error("{tool} is not installed")]
    #[diagnostic(help("install it from https://multipass.run/install and make sure it is on PATH"))]
    ToolNotInstalled { tool: String },

    #[error("valid SSH key required: {path}: {message}")]
    #[diagnostic(help("pass a public key file with --ssh-key, e.g. ~/.ssh/id_ed25519.pub"))]
    InvalidSshKey { path: String, message: String },

    #[error("instance launch failed: {message}")]
    LaunchFailed { message: String },

    #[error("failed to query instance '{name}': {message}")]
    InstanceInfo { name: String, message: String },

    #[error("{command} failed: {message}")]
    ExternalCommand { command: String, message: String },

    #[error("post-launch configuration failed: {steps}")]
    #[diagnostic(help("the instance was created; fix the problem and repeat the failed steps by hand"))]
    ConfigureFailed { steps: String },

    #[error("{context}")]
    Io {
        context: String,
        #[source]
        source: std::io::Error,
    },

    #[error("validation error: {message}")]
    Validation { message: String },
}
