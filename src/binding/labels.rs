//! Container label scheme.
//!
//! Every attribute has a global key `<ns>.<attr>` and a per-port key
//! `<ns>.$port.<attr>` where `$port` is replaced by the container port.
//! Resolution order: per-port, then global, then the caller's default.

use std::collections::HashMap;

/// Substitution token in per-port keys.
pub const PORT_TOKEN: &str = "$port";

/// Namespace used when none is configured.
pub const DEFAULT_NAMESPACE: &str = "org.xiomi.nqkd";

/// A resolvable routing attribute.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum LabelKey {
    Domain,
    NonstandardHttp,
    Ssl,
    Bind,
    Type,
    PortOverride,
    Hide,
}

impl LabelKey {
    pub const ALL: [LabelKey; 7] = [
        LabelKey::Domain,
        LabelKey::NonstandardHttp,
        LabelKey::Ssl,
        LabelKey::Bind,
        LabelKey::Type,
        LabelKey::PortOverride,
        LabelKey::Hide,
    ];

    fn suffix(&self) -> &'static str {
        match self {
            LabelKey::Domain => "domain",
            LabelKey::NonstandardHttp => "http.nonstandard",
            LabelKey::Ssl => "ssl",
            LabelKey::Bind => "bind",
            LabelKey::Type => "type",
            LabelKey::PortOverride => "port.override",
            LabelKey::Hide => "hide",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LabelScheme {
    namespace: String,
}

impl LabelScheme {
    pub fn new(namespace: impl Into<String>) -> Self {
        Self {
            namespace: namespace.into(),
        }
    }

    pub fn namespace(&self) -> &str {
        &self.namespace
    }

    pub fn global_key(&self, key: LabelKey) -> String {
        format!("{}.{}", self.namespace, key.suffix())
    }

    /// Per-port key with the token still in place.
    pub fn port_template(&self, key: LabelKey) -> String {
        format!("{}.{}.{}", self.namespace, PORT_TOKEN, key.suffix())
    }

    pub fn port_key(&self, key: LabelKey, port: u16) -> String {
        self.port_template(key).replace(PORT_TOKEN, &port.to_string())
    }

    /// Most specific value for `key` on `port`, if any.
    pub fn resolve<'a>(&self, labels: &'a HashMap<String, String>, key: LabelKey, port: u16) -> Option<&'a str> {
        labels
            .get(&self.port_key(key, port))
            .or_else(|| labels.get(&self.global_key(key)))
            .map(String::as_str)
    }

    pub fn resolve_or<'a>(&self, labels: &'a HashMap<String, String>, key: LabelKey, port: u16, default: &'a str) -> &'a str {
        self.resolve(labels, key, port).unwrap_or(default)
    }

    /// Boolean attribute: only the exact string `true` is true.
    pub fn flag(&self, labels: &HashMap<String, String>, key: LabelKey, port: u16, default: bool) -> bool {
        match self.resolve(labels, key, port) {
            Some(value) => value == "true",
            None => default,
        }
    }
}

impl Default for LabelScheme {
    fn default() -> Self {
        Self::new(DEFAULT_NAMESPACE)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn labels(pairs: &[(&str, &str)]) -> HashMap<String, String> {
        pairs.iter().map(|(k, v)| (k.to_string(), v.to_string())).collect()
    }

    #[test]
    fn test_key_shapes() {
        let scheme = LabelScheme::default();
        assert_eq!(scheme.global_key(LabelKey::NonstandardHttp), "org.xiomi.nqkd.http.nonstandard");
        assert_eq!(scheme.port_template(LabelKey::PortOverride), "org.xiomi.nqkd.$port.port.override");
        assert_eq!(scheme.port_key(LabelKey::Domain, 8080), "org.xiomi.nqkd.8080.domain");
    }

    #[test]
    fn test_per_port_beats_global() {
        let scheme = LabelScheme::new("org.ns");
        let labels = labels(&[("org.ns.8080.ssl", "false"), ("org.ns.ssl", "true")]);

        assert!(!scheme.flag(&labels, LabelKey::Ssl, 8080, true));
        assert!(scheme.flag(&labels, LabelKey::Ssl, 9090, false));
    }

    #[test]
    fn test_default_when_absent() {
        let scheme = LabelScheme::new("org.ns");
        let labels = labels(&[]);
        assert_eq!(scheme.resolve_or(&labels, LabelKey::Bind, 80, "0.0.0.0"), "0.0.0.0");
        assert!(scheme.flag(&labels, LabelKey::Ssl, 80, true));
        assert!(!scheme.flag(&labels, LabelKey::Hide, 80, false));
    }

    #[test]
    fn test_flag_is_strict() {
        let scheme = LabelScheme::new("org.ns");
        let labels = labels(&[("org.ns.ssl", "TRUE"), ("org.ns.hide", "yes")]);
        assert!(!scheme.flag(&labels, LabelKey::Ssl, 443, true));
        assert!(!scheme.flag(&labels, LabelKey::Hide, 443, true));
    }

    #[test]
    fn test_all_keys_distinct() {
        let scheme = LabelScheme::default();
        let mut keys: Vec<_> = LabelKey::ALL.iter().map(|k| scheme.global_key(*k)).collect();
        keys.sort();
        keys.dedup();
        assert_eq!(keys.len(), LabelKey::ALL.len());
    }
}
