//! Reverse proxy control: validate the written config, then restart.

use std::path::PathBuf;

use thiserror::Error;

use crate::observability::metrics;
use crate::process::{escape_output, run_captured, CapturedOutput};

/// Program used to restart the proxy service.
pub const SERVICE_PROGRAM: &str = "/usr/sbin/service";

#[derive(Debug, Error)]
pub enum ProxyError {
    #[error("failed to launch {program}: {source}")]
    Spawn {
        program: String,
        #[source]
        source: std::io::Error,
    },

    #[error("proxy configuration is invalid ({status}): {output}")]
    Invalid { status: String, output: String },

    #[error("failed to restart service {service} ({status}): {output}")]
    Restart {
        service: String,
        status: String,
        output: String,
    },
}

/// Result of asking the proxy to pick up new configuration.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReloadOutcome {
    Restarted,
    /// No proxy executable configured.
    Skipped,
}

#[derive(Debug, Clone)]
pub struct NginxControl {
    executable: Option<PathBuf>,
    service: String,
    service_program: String,
}

impl NginxControl {
    pub fn new(executable: Option<PathBuf>, service: impl Into<String>) -> Self {
        Self {
            executable,
            service: service.into(),
            service_program: SERVICE_PROGRAM.to_string(),
        }
    }

    /// Use a different program in place of `/usr/sbin/service`.
    pub fn with_service_program(mut self, program: impl Into<String>) -> Self {
        self.service_program = program.into();
        self
    }

    async fn run(program: &str, args: &[&str]) -> Result<CapturedOutput, ProxyError> {
        run_captured(program, args).await.map_err(|source| ProxyError::Spawn {
            program: program.to_string(),
            source,
        })
    }

    /// `<nginx> -t`.
    pub async fn validate(&self, executable: &str) -> Result<(), ProxyError> {
        let output = Self::run(executable, &["-t"]).await?;
        if !output.success() {
            return Err(ProxyError::Invalid {
                status: output.status.to_string(),
                output: escape_output(&output.combined()),
            });
        }
        Ok(())
    }

    /// `service <name> restart`.
    pub async fn restart(&self) -> Result<(), ProxyError> {
        let output = Self::run(&self.service_program, &[self.service.as_str(), "restart"]).await?;
        if !output.success() {
            return Err(ProxyError::Restart {
                service: self.service.clone(),
                status: output.status.to_string(),
                output: escape_output(&output.combined()),
            });
        }
        Ok(())
    }

    /// Validate and restart. Never restarts into a config that failed
    /// validation.
    pub async fn reload(&self) -> Result<ReloadOutcome, ProxyError> {
        let Some(executable) = &self.executable else {
            tracing::info!("Not restarting the proxy, no executable configured");
            metrics::record_proxy_reload("skipped");
            return Ok(ReloadOutcome::Skipped);
        };
        let executable = executable.to_string_lossy();

        if let Err(e) = self.validate(&executable).await {
            tracing::error!(error = %e, "Proxy rejected the new configuration, not restarting");
            metrics::record_proxy_reload("invalid");
            return Err(e);
        }

        if let Err(e) = self.restart().await {
            tracing::error!(service = %self.service, error = %e, "Failed to restart the proxy");
            metrics::record_proxy_reload("failed");
            return Err(e);
        }

        tracing::info!(service = %self.service, "Proxy restarted with new configuration");
        metrics::record_proxy_reload("restarted");
        Ok(ReloadOutcome::Restarted)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::os::unix::fs::PermissionsExt;
    use std::path::Path;

    /// Script that appends its arguments to `log` and exits with `code`.
    fn script(dir: &Path, name: &str, log: &Path, code: i32) -> PathBuf {
        let path = dir.join(name);
        let body = format!("#!/bin/sh\necho \"{name} $@\" >> {}\nexit {code}\n", log.display());
        std::fs::write(&path, body).unwrap();
        std::fs::set_permissions(&path, std::fs::Permissions::from_mode(0o755)).unwrap();
        path
    }

    #[tokio::test]
    async fn test_validate_then_restart() {
        let dir = tempfile::tempdir().unwrap();
        let log = dir.path().join("calls.log");
        let nginx = script(dir.path(), "nginx", &log, 0);
        let service = script(dir.path(), "service", &log, 0);

        let control = NginxControl::new(Some(nginx), "nginx").with_service_program(service.to_string_lossy());
        assert_eq!(control.reload().await.unwrap(), ReloadOutcome::Restarted);

        let calls = std::fs::read_to_string(&log).unwrap();
        assert_eq!(calls, "nginx -t\nservice nginx restart\n");
    }

    #[tokio::test]
    async fn test_invalid_config_is_not_restarted() {
        let dir = tempfile::tempdir().unwrap();
        let log = dir.path().join("calls.log");
        let nginx = script(dir.path(), "nginx", &log, 1);
        let service = script(dir.path(), "service", &log, 0);

        let control = NginxControl::new(Some(nginx), "nginx").with_service_program(service.to_string_lossy());
        assert!(matches!(control.reload().await, Err(ProxyError::Invalid { .. })));

        let calls = std::fs::read_to_string(&log).unwrap();
        assert_eq!(calls, "nginx -t\n");
    }

    #[tokio::test]
    async fn test_no_executable_skips() {
        let control = NginxControl::new(None, "nginx");
        assert_eq!(control.reload().await.unwrap(), ReloadOutcome::Skipped);
    }
}
