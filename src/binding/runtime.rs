//! Container runtime queries.
//!
//! # Responsibilities
//! - List the running containers of a compose project with their ports
//! - Read a container's metadata labels
//!
//! # Design Decisions
//! - [`DockerCli`] shells out to the `docker` CLI and decodes its JSON
//!   output, the same way the orchestrator is driven
//! - No call has a timeout; a hung runtime stalls the pass

use std::collections::{BTreeMap, HashMap};

use async_trait::async_trait;
use serde::Deserialize;
use thiserror::Error;

use crate::process::{escape_output, run_captured};

/// Label every compose-managed container carries.
pub const PROJECT_LABEL: &str = "com.docker.compose.project";

/// Errors from querying the container runtime.
#[derive(Debug, Error)]
pub enum RuntimeError {
    #[error("failed to launch {program}: {source}")]
    Spawn {
        program: String,
        #[source]
        source: std::io::Error,
    },

    #[error("`{command}` exited with {status}: {output}")]
    Failed {
        command: String,
        status: String,
        output: String,
    },

    #[error("could not decode {what}: {source}")]
    Decode {
        what: String,
        #[source]
        source: serde_json::Error,
    },

    #[error("container {container} reports an invalid port {value:?}")]
    InvalidPort { container: String, value: String },
}

/// A container port as the runtime reports it. `public_port` is 0 when the
/// port is exposed but not published.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PublishedPort {
    pub ip: String,
    pub private_port: u16,
    pub public_port: u16,
    pub transport: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RuntimeContainer {
    pub id: String,
    pub ports: Vec<PublishedPort>,
}

/// Read side of the container runtime.
#[async_trait]
pub trait ContainerRuntime: Send + Sync {
    /// Running containers labelled as part of `project`.
    async fn list_project_containers(&self, project: &str) -> Result<Vec<RuntimeContainer>, RuntimeError>;

    /// Metadata labels of one container.
    async fn container_labels(&self, id: &str) -> Result<HashMap<String, String>, RuntimeError>;
}

#[derive(Debug, Deserialize)]
struct InspectedContainer {
    #[serde(rename = "Id")]
    id: String,
    #[serde(rename = "NetworkSettings", default)]
    network: InspectedNetwork,
}

#[derive(Debug, Default, Deserialize)]
struct InspectedNetwork {
    #[serde(rename = "Ports", default)]
    ports: Option<BTreeMap<String, Option<Vec<InspectedBinding>>>>,
}

#[derive(Debug, Deserialize)]
struct InspectedBinding {
    #[serde(rename = "HostIp", default)]
    host_ip: String,
    #[serde(rename = "HostPort", default)]
    host_port: String,
}

/// Split a `80/tcp` port key.
fn parse_port_key(container: &str, key: &str) -> Result<(u16, String), RuntimeError> {
    let invalid = || RuntimeError::InvalidPort {
        container: container.to_string(),
        value: key.to_string(),
    };
    let (port, transport) = key.split_once('/').unwrap_or((key, "tcp"));
    let port = port.parse().map_err(|_| invalid())?;
    Ok((port, transport.to_string()))
}

impl InspectedContainer {
    fn into_runtime(self) -> Result<RuntimeContainer, RuntimeError> {
        let mut ports = Vec::new();
        for (key, bindings) in self.network.ports.unwrap_or_default() {
            let (private_port, transport) = parse_port_key(&self.id, &key)?;
            let bindings = bindings.unwrap_or_default();

            if bindings.is_empty() {
                ports.push(PublishedPort {
                    ip: String::new(),
                    private_port,
                    public_port: 0,
                    transport,
                });
                continue;
            }

            for binding in bindings {
                let public_port = binding.host_port.parse().map_err(|_| RuntimeError::InvalidPort {
                    container: self.id.clone(),
                    value: binding.host_port.clone(),
                })?;
                ports.push(PublishedPort {
                    ip: binding.host_ip,
                    private_port,
                    public_port,
                    transport: transport.clone(),
                });
            }
        }
        Ok(RuntimeContainer { id: self.id, ports })
    }
}

/// Decode `docker inspect` output into containers.
pub fn parse_inspect(output: &str) -> Result<Vec<RuntimeContainer>, RuntimeError> {
    let inspected: Vec<InspectedContainer> = serde_json::from_str(output).map_err(|source| RuntimeError::Decode {
        what: "container inspection".into(),
        source,
    })?;
    inspected.into_iter().map(InspectedContainer::into_runtime).collect()
}

/// Decode `{{json .Config.Labels}}` output. `null` means no labels.
pub fn parse_labels(output: &str) -> Result<HashMap<String, String>, RuntimeError> {
    let labels: Option<HashMap<String, String>> =
        serde_json::from_str(output.trim()).map_err(|source| RuntimeError::Decode {
            what: "container labels".into(),
            source,
        })?;
    Ok(labels.unwrap_or_default())
}

/// `docker` CLI backed runtime.
#[derive(Debug, Clone)]
pub struct DockerCli {
    program: String,
}

impl DockerCli {
    pub fn new(program: impl Into<String>) -> Self {
        Self { program: program.into() }
    }

    async fn docker(&self, args: &[&str]) -> Result<String, RuntimeError> {
        let output = run_captured(&self.program, args)
            .await
            .map_err(|source| RuntimeError::Spawn {
                program: self.program.clone(),
                source,
            })?;

        if !output.success() {
            return Err(RuntimeError::Failed {
                command: format!("{} {}", self.program, args.join(" ")),
                status: output.status.to_string(),
                output: escape_output(&output.combined()),
            });
        }
        Ok(output.stdout)
    }
}

impl Default for DockerCli {
    fn default() -> Self {
        Self::new("docker")
    }
}

#[async_trait]
impl ContainerRuntime for DockerCli {
    async fn list_project_containers(&self, project: &str) -> Result<Vec<RuntimeContainer>, RuntimeError> {
        let filter = format!("label={PROJECT_LABEL}={project}");
        let ids = self.docker(&["ps", "-q", "--no-trunc", "--filter", &filter]).await?;

        let ids: Vec<&str> = ids.split_whitespace().collect();
        if ids.is_empty() {
            return Ok(Vec::new());
        }

        let mut args = vec!["inspect"];
        args.extend(ids);
        parse_inspect(&self.docker(&args).await?)
    }

    async fn container_labels(&self, id: &str) -> Result<HashMap<String, String>, RuntimeError> {
        let output = self.docker(&["inspect", "--format", "{{json .Config.Labels}}", id]).await?;
        parse_labels(&output)
    }
}
