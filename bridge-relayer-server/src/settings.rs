use blockscout_service_launcher::{
    launcher::ConfigSettings,
    tracing::{JaegerSettings, TracingSettings},
};
use bridge_relayer_logic::settings::RelayerSettings;
use serde::Deserialize;

/// Top-level daemon configuration. The HTTP/gRPC surface this crate would
/// otherwise nest under `server`/`metrics` is an external collaborator (see
/// the crate-level design note), so only tracing and the relayer's own
/// settings are loaded here.
#[derive(Debug, Clone, Deserialize, PartialEq, Eq)]
#[serde(deny_unknown_fields)]
pub struct Settings {
    #[serde(default)]
    pub tracing: TracingSettings,
    #[serde(default)]
    pub jaeger: JaegerSettings,
    pub relayer: RelayerSettings,
}

impl ConfigSettings for Settings {
    const SERVICE_NAME: &'static str = "BRIDGE_RELAYER";
}
