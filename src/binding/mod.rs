//! Binding resolution: runtime port state to proxy routing.
//!
//! # Data Flow
//! ```text
//! units (names only)
//!     → ContainerRuntime::list_project_containers (sorted by id)
//!     → ports sorted by (host, container, ip, type), host port 0 dropped
//!     → BindingResult tree (also the JSON output)
//!     → render_bindings: labels per container → PortRoute → nginx blocks
//!     → { "<unit>.svc.http.conf", "<unit>.svc.plain.conf" }
//! ```
//!
//! # Design Decisions
//! - The tree is rebuilt from scratch every pass and never mutated
//! - Any runtime failure aborts the whole pass; partial routing is never
//!   published
//! - Maps are ordered so rendering and JSON output are deterministic

pub mod labels;
pub mod nginx;
pub mod resolver;
pub mod runtime;

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

pub use labels::{LabelKey, LabelScheme, DEFAULT_NAMESPACE};
pub use nginx::TlsFiles;
pub use resolver::{render_bindings, render_container, resolve_port, NginxProjectBinding, PortRoute, RouteDefaults, TrafficType};
pub use runtime::{ContainerRuntime, DockerCli, PublishedPort, RuntimeContainer, RuntimeError};

use crate::units::Unit;

/// One published port of a container.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BindingPortMapping {
    pub container_port: u16,
    pub host_port: u16,
    /// Host address the port is bound to.
    pub binding: String,
    /// Transport as reported by the runtime (`tcp`, `udp`).
    #[serde(rename = "type")]
    pub transport: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BindingContainer {
    /// Runtime container id.
    pub name: String,
    pub ports: Vec<BindingPortMapping>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BindingProject {
    pub project: String,
    pub containers: BTreeMap<String, BindingContainer>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct BindingResult {
    pub projects: BTreeMap<String, BindingProject>,
}

/// Reachable ports of a container, in deterministic order.
pub fn reachable_ports(ports: &[PublishedPort]) -> Vec<BindingPortMapping> {
    let mut sorted: Vec<&PublishedPort> = ports.iter().collect();
    sorted.sort_by(|a, b| {
        a.public_port
            .cmp(&b.public_port)
            .then(a.private_port.cmp(&b.private_port))
            .then_with(|| a.ip.cmp(&b.ip))
            .then_with(|| a.transport.cmp(&b.transport))
    });

    sorted
        .into_iter()
        .filter(|port| port.public_port != 0)
        .map(|port| BindingPortMapping {
            container_port: port.private_port,
            host_port: port.public_port,
            binding: port.ip.clone(),
            transport: port.transport.clone(),
        })
        .collect()
}

/// Containers and reachable ports for one project.
pub async fn collect_project(runtime: &dyn ContainerRuntime, project: &str) -> Result<BindingProject, RuntimeError> {
    let mut containers = runtime.list_project_containers(project).await.inspect_err(|e| {
        tracing::error!(project = %project, error = %e, "Failed to list containers for project, cannot produce bindings");
    })?;
    containers.sort_by(|a, b| a.id.cmp(&b.id));

    tracing::debug!(project = %project, container_count = containers.len(), "Found containers for project");

    let containers = containers
        .into_iter()
        .map(|container| {
            let ports = reachable_ports(&container.ports);
            (
                container.id.clone(),
                BindingContainer {
                    name: container.id,
                    ports,
                },
            )
        })
        .collect();

    Ok(BindingProject {
        project: project.to_string(),
        containers,
    })
}

/// Build the binding tree for every unit. The first runtime error aborts.
pub async fn collect_bindings(runtime: &dyn ContainerRuntime, units: &[Unit]) -> Result<BindingResult, RuntimeError> {
    let mut result = BindingResult::default();
    for unit in units {
        let project = collect_project(runtime, &unit.name).await?;
        result.projects.insert(project.project.clone(), project);
    }
    Ok(result)
}
