//! Configuration types: [`EngineConfig`] (spec.md §6's closed
//! configuration enumeration) and [`OperationRequest`] (the per-call
//! argument bundle [`crate::Engine::create_operation`] takes).
//!
//! Both are plain, `serde`-(de)serializable structs so a host application
//! can load them from a JSON file the way the teacher's own CLI loads its
//! configuration, rather than this crate inventing its own format.

use std::net::SocketAddr;
use std::path::PathBuf;

use logging::Verbosity;
use scheduler::mask::TransferModeDefault;
use scheduler::policy::ConflictPolicies;
use scheduler::worker::OperationKind;
use serde::{Deserialize, Serialize};

/// `max_concurrent_connections_per_operation`'s default, an Open Question
/// spec.md leaves to the implementation (see `DESIGN.md`).
pub const DEFAULT_MAX_CONNECTIONS_PER_OPERATION: u32 = 4;

/// Engine-wide settings, spec.md §6's "Configuration (closed enumeration
/// of options the core recognises)". One value is built once by
/// [`crate::engine_start`] and shared by every operation the resulting
/// [`crate::Engine`] creates.
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    /// Upper bound on how many connections a single operation may run,
    /// absent a narrower request-level override.
    pub max_concurrent_connections_per_operation: u32,
    /// Reply timeout, milliseconds. Recorded for configuration fidelity;
    /// the current `control` implementation applies its own fixed
    /// `DEFAULT_REPLY_TIMEOUT` (20 000 ms) regardless of this value — see
    /// `DESIGN.md`.
    pub server_reply_timeout_ms: u64,
    /// No-data-transfer timeout, milliseconds. See the same caveat as
    /// [`Self::server_reply_timeout_ms`].
    pub no_data_transfer_timeout_ms: u64,
    /// Reconnect backoff wait, milliseconds. See the same caveat as
    /// [`Self::server_reply_timeout_ms`].
    pub reconnect_wait_ms: u64,
    /// Keep-alive period, milliseconds. See the same caveat as
    /// [`Self::server_reply_timeout_ms`].
    pub keep_alive_period_ms: u64,
    /// Whether new control connections default to passive data channels.
    pub use_passive_default: bool,
    /// Whether new control connections negotiate `AUTH TLS`.
    pub encrypt_control: bool,
    /// Whether data connections negotiate `PROT P`.
    pub encrypt_data: bool,
    /// Whether `MODE Z` compression is offered.
    pub compress_mode_z: bool,
    /// How much detail [`crate::Engine`]'s log sink prints.
    pub verbosity: Verbosity,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            max_concurrent_connections_per_operation: DEFAULT_MAX_CONNECTIONS_PER_OPERATION,
            server_reply_timeout_ms: 20_000,
            no_data_transfer_timeout_ms: 30_000,
            reconnect_wait_ms: 20_000,
            keep_alive_period_ms: 30_000,
            use_passive_default: true,
            encrypt_control: false,
            encrypt_data: false,
            compress_mode_z: false,
            verbosity: Verbosity::default(),
        }
    }
}

impl EngineConfig {
    /// Parses an [`EngineConfig`] from JSON text.
    ///
    /// # Errors
    ///
    /// Returns [`crate::EngineError::Config`] if `json` does not parse.
    pub fn from_json(json: &str) -> Result<Self, crate::EngineError> {
        serde_json::from_str(json).map_err(Into::into)
    }
}

/// The credentials and address [`crate::Engine::create_operation`] dials,
/// spec.md §3's "endpoint".
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct EndpointConfig {
    /// The address to dial.
    pub addr: SocketAddr,
    /// `USER` argument.
    pub user: String,
    /// `PASS` argument.
    pub password: String,
    /// Whether to negotiate `AUTH TLS` for this connection, overriding
    /// [`EngineConfig::encrypt_control`] when set.
    pub encrypt_control: Option<bool>,
}

impl EndpointConfig {
    /// Builds a [`control::Endpoint`], folding in `engine_default` for
    /// `encrypt_control` when this request left it unset.
    #[must_use]
    pub fn to_control_endpoint(&self, engine_default: &EngineConfig) -> control::Endpoint {
        let encrypt = self.encrypt_control.unwrap_or(engine_default.encrypt_control);
        control::Endpoint::new(self.addr, self.user.clone(), self.password.clone()).with_encrypt_control(encrypt)
    }
}

/// One argument bundle to [`crate::Engine::create_operation`]: which kind
/// of operation, which server and roots, and the conflict policies and
/// masks governing it, spec.md §6's
/// `create_operation(kind, endpoint, roots, policies) -> Operation`.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct OperationRequest {
    /// The operation family.
    pub kind: OperationKind,
    /// The server to connect to.
    pub endpoint: EndpointConfig,
    /// The local root path (source for an upload, destination for a
    /// download/delete-adjacent local cleanup).
    pub local_root: PathBuf,
    /// The remote root path (destination for an upload, source for a
    /// download/delete/chattr).
    pub remote_root: String,
    /// The conflict policies in effect for the whole operation.
    #[serde(default)]
    pub policies: ConflictPolicies,
    /// Attributes to apply, required for [`OperationKind::ChAttr`].
    #[serde(default)]
    pub unix_mode: Option<u32>,
    /// Which entries a directory exploration includes at all (spec.md
    /// §6's `masks`). Empty matches every name.
    #[serde(default)]
    pub masks: Vec<String>,
    /// Which file names transfer in ASCII under
    /// `transfer_mode_default: Autodetect` (spec.md §6's `ascii_mask`).
    #[serde(default)]
    pub ascii_mask: Vec<String>,
    /// How a worker picks a transfer mode for a file it has not yet
    /// inspected.
    #[serde(default)]
    pub transfer_mode_default: TransferModeDefault,
    /// How many workers to start with. Defaults to
    /// [`EngineConfig::max_concurrent_connections_per_operation`] when unset.
    #[serde(default)]
    pub initial_workers: Option<u32>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn engine_config_defaults_match_spec_timeouts() {
        let config = EngineConfig::default();
        assert_eq!(config.server_reply_timeout_ms, 20_000);
        assert_eq!(config.no_data_transfer_timeout_ms, 30_000);
        assert_eq!(config.keep_alive_period_ms, 30_000);
        assert_eq!(config.max_concurrent_connections_per_operation, DEFAULT_MAX_CONNECTIONS_PER_OPERATION);
    }

    #[test]
    fn engine_config_round_trips_through_json() {
        let config = EngineConfig { compress_mode_z: true, ..EngineConfig::default() };
        let json = serde_json::to_string(&config).unwrap();
        let parsed = EngineConfig::from_json(&json).unwrap();
        assert!(parsed.compress_mode_z);
    }

    #[test]
    fn endpoint_config_falls_back_to_engine_default_encryption() {
        let engine_default = EngineConfig { encrypt_control: true, ..EngineConfig::default() };
        let request = EndpointConfig {
            addr: "127.0.0.1:21".parse().unwrap(),
            user: "anonymous".into(),
            password: "guest".into(),
            encrypt_control: None,
        };
        let endpoint = request.to_control_endpoint(&engine_default);
        assert!(endpoint.encrypt_control);
    }
}
