//! Configuration schema definitions.
//!
//! Every section and field has a default, so an empty file is a valid
//! configuration apart from the unit roots, which validation requires.

use std::net::SocketAddr;
use std::path::PathBuf;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::binding::{LabelScheme, RouteDefaults, TlsFiles, DEFAULT_NAMESPACE};
use crate::units::LoadOptions;

/// Root configuration for the daemon.
#[derive(Debug, Clone, Deserialize, Serialize, Default)]
#[serde(default)]
pub struct DaemonConfig {
    /// Unit definition roots, shared by both engines.
    pub paths: Vec<PathBuf>,

    pub units: UnitsConfig,

    pub apply: ApplyConfig,

    pub binding: BindingConfig,

    pub events: EventsConfig,

    pub control: ControlConfig,

    pub observability: ObservabilityConfig,
}

impl DaemonConfig {
    pub fn load_options(&self) -> LoadOptions {
        LoadOptions {
            extensions: self.units.extensions.clone(),
            mount_namespace: self.units.mount_namespace.clone(),
        }
    }

    pub fn route_defaults(&self) -> RouteDefaults {
        RouteDefaults {
            default_domain: self.binding.default_domain.clone(),
            tls: TlsFiles {
                certificate: self.binding.ssl_certificate.clone(),
                private_key: self.binding.ssl_private_key.clone(),
            },
        }
    }

    pub fn label_scheme(&self) -> LabelScheme {
        LabelScheme::new(self.binding.label_namespace.clone())
    }
}

#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct UnitsConfig {
    /// Extensions (without the dot) treated as unit definitions.
    pub extensions: Vec<String>,

    /// Directory under `/mnt` holding expanded auto volumes.
    pub mount_namespace: String,
}

impl Default for UnitsConfig {
    fn default() -> Self {
        let options = LoadOptions::default();
        Self {
            extensions: options.extensions,
            mount_namespace: options.mount_namespace,
        }
    }
}

#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ApplyConfig {
    /// Evaluate drift but never apply.
    pub dry_run: bool,

    pub interval_secs: u64,

    /// Program providing the `compose` subcommand.
    pub compose_program: String,
}

impl Default for ApplyConfig {
    fn default() -> Self {
        Self {
            dry_run: false,
            interval_secs: 300,
            compose_program: "docker".to_string(),
        }
    }
}

impl ApplyConfig {
    pub fn interval(&self) -> Duration {
        Duration::from_secs(self.interval_secs)
    }
}

#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct BindingConfig {
    /// Run the binding engine inside `launch`.
    pub enabled: bool,

    /// Keep running and rebind on changes instead of a single pass.
    pub watch: bool,

    pub interval_secs: u64,

    pub default_domain: String,

    pub ssl_certificate: String,

    pub ssl_private_key: String,

    /// Where rendered nginx files are written.
    pub output_dir: PathBuf,

    /// nginx binary used to validate before restarting. No restart when unset.
    pub nginx_executable: Option<PathBuf>,

    pub service_name: String,

    pub label_namespace: String,

    /// Program used to query the container runtime.
    pub runtime_program: String,
}

impl Default for BindingConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            watch: false,
            interval_secs: 60,
            default_domain: String::new(),
            ssl_certificate: String::new(),
            ssl_private_key: String::new(),
            output_dir: PathBuf::from("."),
            nginx_executable: None,
            service_name: "nginx".to_string(),
            label_namespace: DEFAULT_NAMESPACE.to_string(),
            runtime_program: "docker".to_string(),
        }
    }
}

impl BindingConfig {
    pub fn interval(&self) -> Duration {
        Duration::from_secs(self.interval_secs)
    }
}

#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct EventsConfig {
    /// Bounded capacity of the runtime event channel.
    pub queue_capacity: usize,
}

impl Default for EventsConfig {
    fn default() -> Self {
        Self { queue_capacity: 30 }
    }
}

#[derive(Debug, Clone, Deserialize, Serialize, Default)]
#[serde(default)]
pub struct ControlConfig {
    pub socket_path: Option<PathBuf>,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ObservabilityConfig {
    /// Default filter; `RUST_LOG` takes precedence.
    pub log_level: String,

    pub metrics_enabled: bool,

    /// Prometheus scrape address.
    pub metrics_address: String,
}

impl Default for ObservabilityConfig {
    fn default() -> Self {
        Self {
            log_level: "info".to_string(),
            metrics_enabled: false,
            metrics_address: "127.0.0.1:9187".to_string(),
        }
    }
}

impl ObservabilityConfig {
    pub fn metrics_socket(&self) -> Option<SocketAddr> {
        self.metrics_address.parse().ok()
    }
}
