pub mod multipass;

use std::net::Ipv4Addr;

use crate::error::MpvmError;

/// Operations the provisioning flow needs from the virtualization tool.
#[allow(async_fn_in_trait)] // trait is internal-only
pub trait Backend {
    /// Create an instance; `args` are the full `launch` options. Returns the
    /// tool's combined output for the caller to parse.
    async fn launch(&self, args: &[String]) -> Result<String, MpvmError>;

    /// Run `argv` inside the instance, optionally feeding `stdin`.
    async fn exec(&self, instance: &str, argv: &[&str], stdin: Option<&[u8]>)
    -> Result<(), MpvmError>;

    /// First IPv4 address assigned to the instance.
    async fn ipv4(&self, instance: &str) -> Result<Ipv4Addr, MpvmError>;
}
