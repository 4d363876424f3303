//! Shared fakes for integration tests.

#![allow(dead_code)]

use std::collections::{HashMap, HashSet};
use std::path::{Path, PathBuf};
use std::sync::Mutex;
use std::time::Duration;

use async_trait::async_trait;

use nqkd::apply::{ComposeError, ComposeRunner};
use nqkd::binding::{ContainerRuntime, PublishedPort, RuntimeContainer, RuntimeError};
use nqkd::units::Unit;

pub const UP_TO_DATE: &str = " Container x-1  Running\nend of 'compose up' output\n";
pub const DRIFTED: &str = " Container x-1  Recreate\n Container x-1  Recreated\n";

/// What the fake orchestrator answers for one unit's dry run.
#[derive(Debug, Clone)]
pub enum DryRun {
    Output(&'static str),
    Fail,
}

/// A compose runner driven by a per-unit script. Units without a script
/// report up to date.
#[derive(Default)]
pub struct ScriptedCompose {
    script: Mutex<HashMap<String, DryRun>>,
    failing_applies: Mutex<Vec<String>>,
    applied: Mutex<Vec<String>>,
}

impl ScriptedCompose {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn script(&self, unit: &str, dry_run: DryRun) {
        self.script.lock().unwrap().insert(unit.to_string(), dry_run);
    }

    pub fn fail_apply(&self, unit: &str) {
        self.failing_applies.lock().unwrap().push(unit.to_string());
    }

    pub fn applied(&self) -> Vec<String> {
        self.applied.lock().unwrap().clone()
    }
}

fn failed(output: &str) -> ComposeError {
    ComposeError::Failed {
        program: "docker".into(),
        status: "exit status: 1".into(),
        output: output.into(),
    }
}

#[async_trait]
impl ComposeRunner for ScriptedCompose {
    async fn dry_run(&self, unit: &Unit) -> Result<String, ComposeError> {
        let scripted = self.script.lock().unwrap().get(&unit.name).cloned();
        match scripted.unwrap_or(DryRun::Output(UP_TO_DATE)) {
            DryRun::Output(output) => Ok(output.to_string()),
            DryRun::Fail => Err(failed("dry run refused")),
        }
    }

    async fn apply(&self, unit: &Unit) -> Result<(), ComposeError> {
        if self.failing_applies.lock().unwrap().contains(&unit.name) {
            return Err(failed("apply refused"));
        }
        self.applied.lock().unwrap().push(unit.name.clone());
        Ok(())
    }
}

/// A container runtime backed by maps.
#[derive(Default)]
pub struct InMemoryRuntime {
    projects: Mutex<HashMap<String, Vec<RuntimeContainer>>>,
    labels: Mutex<HashMap<String, HashMap<String, String>>>,
    failing_labels: Mutex<HashSet<String>>,
}

impl InMemoryRuntime {
    pub fn new() -> Self {
        Self::default()
    }

    /// Make label lookups for container `id` fail like a refused inspect.
    pub fn fail_labels(&self, id: &str) {
        self.failing_labels.lock().unwrap().insert(id.to_string());
    }

    pub fn add_container(&self, project: &str, id: &str, ports: &[(u16, u16, &str)], labels: &[(&str, &str)]) {
        let ports = ports
            .iter()
            .map(|(private, public, transport)| PublishedPort {
                ip: "0.0.0.0".into(),
                private_port: *private,
                public_port: *public,
                transport: transport.to_string(),
            })
            .collect();

        self.projects
            .lock()
            .unwrap()
            .entry(project.to_string())
            .or_default()
            .push(RuntimeContainer { id: id.to_string(), ports });
        self.labels.lock().unwrap().insert(
            id.to_string(),
            labels.iter().map(|(k, v)| (k.to_string(), v.to_string())).collect(),
        );
    }
}

#[async_trait]
impl ContainerRuntime for InMemoryRuntime {
    async fn list_project_containers(&self, project: &str) -> Result<Vec<RuntimeContainer>, RuntimeError> {
        Ok(self.projects.lock().unwrap().get(project).cloned().unwrap_or_default())
    }

    async fn container_labels(&self, id: &str) -> Result<HashMap<String, String>, RuntimeError> {
        if self.failing_labels.lock().unwrap().contains(id) {
            return Err(RuntimeError::Failed {
                command: "docker inspect".into(),
                status: "exit status: 1".into(),
                output: "no such container".into(),
            });
        }
        Ok(self.labels.lock().unwrap().get(id).cloned().unwrap_or_default())
    }
}

/// Write a definition file under `dir`, creating parents.
pub fn write_unit(dir: &Path, rel: &str, body: &str) -> PathBuf {
    let path = dir.join(rel);
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent).unwrap();
    }
    std::fs::write(&path, body).unwrap();
    path
}

/// Poll `check` until it holds or the deadline passes.
pub async fn eventually<F, Fut>(mut check: F) -> bool
where
    F: FnMut() -> Fut,
    Fut: std::future::Future<Output = bool>,
{
    for _ in 0..300 {
        if check().await {
            return true;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    false
}
