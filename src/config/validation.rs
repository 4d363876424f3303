//! Configuration validation.
//!
//! # Design Decisions
//! - Returns all validation errors, not just the first
//! - Pure function: DaemonConfig → Result<(), Vec<ValidationError>>
//! - Runs after command-line overrides, before anything starts

use std::net::SocketAddr;

use thiserror::Error;

use crate::config::schema::DaemonConfig;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ValidationError {
    #[error("no unit definition paths configured")]
    NoPaths,

    #[error("{field} must be greater than zero")]
    Zero { field: &'static str },

    #[error("{field} must not be empty")]
    Empty { field: &'static str },

    #[error("ssl_certificate and ssl_private_key must be set together")]
    IncompleteTls,

    #[error("invalid metrics address {0:?}")]
    MetricsAddress(String),
}

pub fn validate_config(config: &DaemonConfig) -> Result<(), Vec<ValidationError>> {
    let mut errors = Vec::new();

    if config.paths.is_empty() {
        errors.push(ValidationError::NoPaths);
    }

    if config.apply.interval_secs == 0 {
        errors.push(ValidationError::Zero { field: "apply.interval_secs" });
    }
    if config.binding.interval_secs == 0 {
        errors.push(ValidationError::Zero { field: "binding.interval_secs" });
    }
    if config.events.queue_capacity == 0 {
        errors.push(ValidationError::Zero { field: "events.queue_capacity" });
    }

    if config.units.extensions.is_empty() {
        errors.push(ValidationError::Empty { field: "units.extensions" });
    }
    if config.units.mount_namespace.is_empty() {
        errors.push(ValidationError::Empty { field: "units.mount_namespace" });
    }
    if config.binding.label_namespace.is_empty() {
        errors.push(ValidationError::Empty { field: "binding.label_namespace" });
    }

    if config.binding.ssl_certificate.is_empty() != config.binding.ssl_private_key.is_empty() {
        errors.push(ValidationError::IncompleteTls);
    }

    if config.observability.metrics_address.parse::<SocketAddr>().is_err() {
        errors.push(ValidationError::MetricsAddress(config.observability.metrics_address.clone()));
    }

    if errors.is_empty() {
        Ok(())
    } else {
        Err(errors)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::PathBuf;

    fn valid() -> DaemonConfig {
        DaemonConfig {
            paths: vec![PathBuf::from("/srv/units")],
            ..DaemonConfig::default()
        }
    }

    #[test]
    fn test_defaults_with_a_path_are_valid() {
        assert_eq!(validate_config(&valid()), Ok(()));
    }

    #[test]
    fn test_collects_every_problem() {
        let mut config = DaemonConfig::default();
        config.apply.interval_secs = 0;
        config.events.queue_capacity = 0;
        config.binding.ssl_certificate = "/etc/cert.pem".into();
        config.observability.metrics_address = "nowhere".into();

        let errors = validate_config(&config).unwrap_err();
        assert_eq!(
            errors,
            vec![
                ValidationError::NoPaths,
                ValidationError::Zero { field: "apply.interval_secs" },
                ValidationError::Zero { field: "events.queue_capacity" },
                ValidationError::IncompleteTls,
                ValidationError::MetricsAddress("nowhere".into()),
            ]
        );
    }

    #[test]
    fn test_empty_namespaces_rejected() {
        let mut config = valid();
        config.units.mount_namespace.clear();
        config.binding.label_namespace.clear();
        config.units.extensions.clear();

        let errors = validate_config(&config).unwrap_err();
        assert_eq!(errors.len(), 3);
    }
}
