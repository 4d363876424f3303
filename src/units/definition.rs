//! Unit definition documents.
//!
//! A definition is a compose-style YAML document. Only the keys this daemon
//! rewrites are typed; everything else is carried through untouched:
//!
//! ```yaml
//! name: Media Server          # optional, falls back to the file stem
//! services:
//!   jellyfin:
//!     image: jellyfin/jellyfin
//!     auto_volumes:           # shorthand, expanded into `volumes`
//!       - /config
//!       - /cache
//! ```
//!
//! `auto_volumes: [/config]` on unit `media_server` becomes the bind mount
//! `/mnt/nqkd/media_server/config:/config`.

use std::collections::BTreeMap;
use std::path::Path;

use serde::{Deserialize, Serialize};
use serde_yaml::{Mapping, Value};
use thiserror::Error;

use crate::units::name::{normalize_name, NameError};

/// Errors raised while parsing or rewriting a single definition file.
#[derive(Debug, Error)]
pub enum DefinitionError {
    #[error("document does not match the definition schema: {0}")]
    Schema(#[source] serde_yaml::Error),

    #[error("invalid unit name: {0}")]
    Name(#[from] NameError),

    #[error("unit name must be a string, found {0:?}")]
    NameNotString(Value),

    #[error("service `{service}` has a non-string auto volume {token:?}")]
    AutoVolumeNotString { service: String, token: Value },

    #[error("cannot derive a unit name from {0}")]
    NoFileStem(String),

    #[error("service `{service}` has an auto volume `{token}` with no usable path")]
    EmptyAutoVolume { service: String, token: String },

    #[error("failed to render the rewritten document: {0}")]
    Render(#[source] serde_yaml::Error),
}

#[derive(Debug, Deserialize, Serialize)]
struct Definition {
    #[serde(default, skip_serializing)]
    name: Option<Value>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    services: Option<BTreeMap<String, ServiceDefinition>>,

    #[serde(flatten)]
    rest: Mapping,
}

#[derive(Debug, Deserialize, Serialize)]
struct ServiceDefinition {
    #[serde(default, skip_serializing)]
    auto_volumes: Option<Vec<Value>>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    volumes: Option<Vec<Value>>,

    #[serde(flatten)]
    rest: Mapping,
}

/// A definition after name resolution and shorthand expansion.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParsedDefinition {
    /// Normalized unit name.
    pub name: String,
    /// Rewritten document, ready to hand to the orchestrator.
    pub content: String,
}

/// Parse a definition document read from `source`.
///
/// `namespace` is the directory under `/mnt` that auto volumes are placed in.
pub fn parse_definition(
    source: &Path,
    text: &str,
    namespace: &str,
) -> Result<ParsedDefinition, DefinitionError> {
    let mut definition: Definition = serde_yaml::from_str(text).map_err(DefinitionError::Schema)?;

    let raw_name = match definition.name.take() {
        Some(Value::String(name)) => name,
        Some(other) => return Err(DefinitionError::NameNotString(other)),
        None => source
            .file_stem()
            .map(|stem| stem.to_string_lossy().into_owned())
            .ok_or_else(|| DefinitionError::NoFileStem(source.display().to_string()))?,
    };
    let name = normalize_name(&raw_name)?;

    if let Some(services) = definition.services.as_mut() {
        for (service_name, service) in services.iter_mut() {
            let Some(tokens) = service.auto_volumes.take() else {
                continue;
            };

            let volumes = service.volumes.get_or_insert_with(Vec::new);
            for token in &tokens {
                let Value::String(token) = token else {
                    return Err(DefinitionError::AutoVolumeNotString {
                        service: service_name.clone(),
                        token: token.clone(),
                    });
                };
                let mount = expand_auto_volume(namespace, &name, token).map_err(|e| match e {
                    DefinitionError::EmptyAutoVolume { token, .. } => DefinitionError::EmptyAutoVolume {
                        service: service_name.clone(),
                        token,
                    },
                    other => other,
                })?;
                volumes.push(Value::String(mount));
            }

            tracing::info!(
                unit = %name,
                service = %service_name,
                count = tokens.len(),
                "Expanded auto volumes into bind mounts"
            );
        }
    }

    let content = serde_yaml::to_string(&definition).map_err(DefinitionError::Render)?;
    Ok(ParsedDefinition { name, content })
}

/// Expand one `auto_volumes` token into an explicit `host:container` bind mount.
pub fn expand_auto_volume(namespace: &str, unit: &str, token: &str) -> Result<String, DefinitionError> {
    let trimmed = token.trim_start_matches('/');
    if trimmed.is_empty() {
        return Err(DefinitionError::EmptyAutoVolume {
            service: String::new(),
            token: token.to_string(),
        });
    }

    let subpath = normalize_name(&trimmed.replace('/', "_"))?;
    Ok(format!("/mnt/{namespace}/{unit}/{subpath}:{token}"))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(file: &str, text: &str) -> Result<ParsedDefinition, DefinitionError> {
        parse_definition(Path::new(file), text, "nqkd")
    }

    fn service_volumes(content: &str, service: &str) -> Vec<String> {
        let doc: Value = serde_yaml::from_str(content).unwrap();
        doc["services"][service]["volumes"]
            .as_sequence()
            .unwrap()
            .iter()
            .map(|v| v.as_str().unwrap().to_string())
            .collect()
    }

    #[test]
    fn test_name_key_wins_over_file_stem() {
        let parsed = parse("/srv/units/other.yaml", "name: Media Server\nservices: {}\n").unwrap();
        assert_eq!(parsed.name, "media server");
        assert!(!parsed.content.contains("Media Server"));
    }

    #[test]
    fn test_file_stem_used_without_name() {
        let parsed = parse("/srv/units/Home.Assistant.yaml", "services: {}\n").unwrap();
        assert_eq!(parsed.name, "home_assistant");
    }

    #[test]
    fn test_auto_volumes_expand_into_volumes() {
        let text = r#"
services:
  web:
    image: nginx
    volumes:
      - ./static:/usr/share/nginx/html
    auto_volumes:
      - /var/lib/data
      - config
"#;
        let parsed = parse("/srv/site.yaml", text).unwrap();
        assert_eq!(
            service_volumes(&parsed.content, "web"),
            vec![
                "./static:/usr/share/nginx/html".to_string(),
                "/mnt/nqkd/site/var_lib_data:/var/lib/data".to_string(),
                "/mnt/nqkd/site/config:config".to_string(),
            ]
        );
        assert!(!parsed.content.contains("auto_volumes"));
    }

    #[test]
    fn test_auto_volumes_create_missing_volume_list() {
        let text = "services:\n  db:\n    image: postgres\n    auto_volumes: [/var/lib/postgresql/data]\n";
        let parsed = parse("/srv/db.yaml", text).unwrap();
        assert_eq!(
            service_volumes(&parsed.content, "db"),
            vec!["/mnt/nqkd/db/var_lib_postgresql_data:/var/lib/postgresql/data".to_string()]
        );
    }

    #[test]
    fn test_unknown_keys_pass_through() {
        let text = "networks:\n  edge: {}\nservices:\n  app:\n    image: busybox\n    restart: always\n";
        let parsed = parse("/srv/app.yaml", text).unwrap();
        let doc: Value = serde_yaml::from_str(&parsed.content).unwrap();
        assert!(doc["networks"]["edge"].is_mapping());
        assert_eq!(doc["services"]["app"]["restart"].as_str(), Some("always"));
    }

    #[test]
    fn test_non_string_name_rejected() {
        let err = parse("/srv/app.yaml", "name: 42\nservices: {}\n").unwrap_err();
        assert!(matches!(err, DefinitionError::NameNotString(_)));
        let err = parse("/srv/app.yaml", "name: true\nservices: {}\n").unwrap_err();
        assert!(matches!(err, DefinitionError::NameNotString(_)));
    }

    #[test]
    fn test_non_string_auto_volume_rejected() {
        let err = parse("/srv/app.yaml", "services:\n  app:\n    auto_volumes: [42]\n").unwrap_err();
        match err {
            DefinitionError::AutoVolumeNotString { service, token } => {
                assert_eq!(service, "app");
                assert_eq!(token, Value::Number(42u64.into()));
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn test_leading_symbol_auto_volume_is_stable() {
        assert_eq!(
            expand_auto_volume("nqkd", "app", "/-cache").unwrap(),
            "/mnt/nqkd/app/nqkd_cache:/-cache"
        );
    }

    #[test]
    fn test_non_list_auto_volumes_rejected() {
        let err = parse("/srv/app.yaml", "services:\n  app:\n    auto_volumes: /data\n").unwrap_err();
        assert!(matches!(err, DefinitionError::Schema(_)));
    }

    #[test]
    fn test_slash_only_token_rejected() {
        let err = parse("/srv/app.yaml", "services:\n  app:\n    auto_volumes: ['///']\n").unwrap_err();
        match err {
            DefinitionError::EmptyAutoVolume { service, token } => {
                assert_eq!(service, "app");
                assert_eq!(token, "///");
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn test_expand_uses_namespace() {
        assert_eq!(
            expand_auto_volume("fleet", "blog", "/srv/www").unwrap(),
            "/mnt/fleet/blog/srv_www:/srv/www"
        );
    }
}
