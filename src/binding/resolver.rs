//! Per-port route resolution and rendering.
//!
//! # Resolution (per kept port, labels per-port > global > default)
//! ```text
//! hide            default false     → skip port
//! binding "::"                      → skip port (IPv4 wildcard covers it)
//! type            default observed  → mismatch guard, observed wins
//! ssl             default true
//! bind            default 0.0.0.0
//! domain          default configured domain
//! http/https only:
//!   http.nonstandard  default false → listen on port.override or the
//!                                     container port; else 443 / 80
//! ```

use std::collections::{BTreeMap, HashMap};
use std::fmt;

use crate::binding::labels::{LabelKey, LabelScheme};
use crate::binding::nginx::{self, TlsFiles};
use crate::binding::runtime::{ContainerRuntime, RuntimeError};
use crate::binding::{BindingContainer, BindingPortMapping, BindingResult};

/// IPv6 wildcard address.
pub const IPV6_WILDCARD: &str = "::";

/// Suffix of the HTTP rules file for a unit.
pub const HTTP_FILE_SUFFIX: &str = ".svc.http.conf";
/// Suffix of the TCP/UDP rules file for a unit.
pub const PLAIN_FILE_SUFFIX: &str = ".svc.plain.conf";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TrafficType {
    Http,
    Https,
    Tcp,
    Udp,
}

impl TrafficType {
    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "http" => Some(TrafficType::Http),
            "https" => Some(TrafficType::Https),
            "tcp" => Some(TrafficType::Tcp),
            "udp" => Some(TrafficType::Udp),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            TrafficType::Http => "http",
            TrafficType::Https => "https",
            TrafficType::Tcp => "tcp",
            TrafficType::Udp => "udp",
        }
    }

    pub fn is_http(&self) -> bool {
        matches!(self, TrafficType::Http | TrafficType::Https)
    }

    /// Whether a port declared as `self` cannot be carried over `observed`.
    fn contradicts(&self, observed: &str) -> bool {
        match self {
            TrafficType::Tcp | TrafficType::Http | TrafficType::Https => observed == "udp",
            TrafficType::Udp => observed == "tcp",
        }
    }
}

impl fmt::Display for TrafficType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Configuration-level defaults for rendering.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RouteDefaults {
    pub default_domain: String,
    pub tls: TlsFiles,
}

/// Fully resolved routing for one port.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PortRoute {
    pub traffic: TrafficType,
    /// `<bind>:<port>` the proxy listens on.
    pub listen: String,
    pub tls: bool,
    pub domain: String,
    pub upstream_ip: String,
    pub upstream_port: u16,
}

impl PortRoute {
    pub fn render(&self, defaults: &RouteDefaults) -> String {
        let tls = self.tls.then_some(&defaults.tls);
        match self.traffic {
            TrafficType::Http | TrafficType::Https => nginx::http_server(
                &self.listen,
                tls,
                &self.domain,
                self.traffic.as_str(),
                &self.upstream_ip,
                self.upstream_port,
            ),
            TrafficType::Tcp => nginx::tcp_server(&self.listen, tls, &self.upstream_ip, self.upstream_port),
            TrafficType::Udp => nginx::udp_server(&self.listen, &self.upstream_ip, self.upstream_port),
        }
    }
}

/// Resolve one port. `None` means the port gets no route.
pub fn resolve_port(
    scheme: &LabelScheme,
    labels: &HashMap<String, String>,
    port: &BindingPortMapping,
    defaults: &RouteDefaults,
) -> Option<PortRoute> {
    let cport = port.container_port;

    if scheme.flag(labels, LabelKey::Hide, cport, false) {
        tracing::debug!(port = cport, "Skipping port because it is marked as hidden");
        return None;
    }

    if port.binding == IPV6_WILDCARD {
        tracing::debug!(port = cport, binding = %port.binding, "Skipping port because it is bound to the IPv6 wildcard");
        return None;
    }

    let declared = scheme.resolve_or(labels, LabelKey::Type, cport, &port.transport);
    let Some(mut traffic) = TrafficType::parse(declared) else {
        tracing::warn!(port = cport, protocol = %declared, "Failed to create binding because the protocol was not recognised");
        return None;
    };

    if traffic.contradicts(&port.transport) {
        tracing::error!(
            port = cport,
            defined = %traffic,
            observed = %port.transport,
            "Declared port type contradicts the runtime, using the runtime's type"
        );
        traffic = TrafficType::parse(&port.transport)?;
    }

    let tls = scheme.flag(labels, LabelKey::Ssl, cport, true);
    let bind = scheme.resolve_or(labels, LabelKey::Bind, cport, "0.0.0.0");
    let domain = scheme.resolve_or(labels, LabelKey::Domain, cport, &defaults.default_domain);

    let listen_port = if traffic.is_http() {
        if scheme.flag(labels, LabelKey::NonstandardHttp, cport, false) {
            scheme
                .resolve(labels, LabelKey::PortOverride, cport)
                .map(str::to_string)
                .unwrap_or_else(|| cport.to_string())
        } else if tls {
            "443".to_string()
        } else {
            "80".to_string()
        }
    } else {
        cport.to_string()
    };

    let route = PortRoute {
        traffic,
        listen: format!("{bind}:{listen_port}"),
        tls,
        domain: domain.to_string(),
        upstream_ip: port.binding.clone(),
        upstream_port: port.host_port,
    };
    tracing::debug!(
        port = cport,
        r#type = %route.traffic,
        ssl = route.tls,
        listen = %route.listen,
        domain = %route.domain,
        "Port configuration"
    );
    Some(route)
}

/// Rendered rules for a container or a whole unit.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct NginxProjectBinding {
    /// HTTP(S) virtual hosts.
    pub http: String,
    /// TCP and UDP stream proxies.
    pub plain: String,
}

impl NginxProjectBinding {
    fn append(&mut self, other: NginxProjectBinding) {
        self.http.push_str(&other.http);
        self.plain.push_str(&other.plain);
    }
}

/// Render every port of one container, in port order.
pub fn render_container(
    scheme: &LabelScheme,
    container: &BindingContainer,
    labels: &HashMap<String, String>,
    defaults: &RouteDefaults,
) -> NginxProjectBinding {
    let mut rendered = NginxProjectBinding::default();
    for port in &container.ports {
        let Some(route) = resolve_port(scheme, labels, port, defaults) else {
            continue;
        };
        let block = route.render(defaults);
        if route.traffic.is_http() {
            rendered.http.push_str(&block);
        } else {
            rendered.plain.push_str(&block);
        }
    }
    rendered
}

/// Render the file set for a binding tree. Empty files are omitted. Any
/// label lookup failure aborts.
pub async fn render_bindings(
    runtime: &dyn ContainerRuntime,
    result: &BindingResult,
    scheme: &LabelScheme,
    defaults: &RouteDefaults,
) -> Result<BTreeMap<String, String>, RuntimeError> {
    let mut files = BTreeMap::new();

    for project in result.projects.values() {
        let mut unit = NginxProjectBinding::default();
        for container in project.containers.values() {
            let labels = runtime.container_labels(&container.name).await.inspect_err(|e| {
                tracing::error!(
                    project = %project.project,
                    container = %container.name,
                    error = %e,
                    "Failed to read container labels"
                );
            })?;
            unit.append(render_container(scheme, container, &labels, defaults));
        }

        if !unit.http.is_empty() {
            files.insert(format!("{}{HTTP_FILE_SUFFIX}", project.project), unit.http);
        }
        if !unit.plain.is_empty() {
            files.insert(format!("{}{PLAIN_FILE_SUFFIX}", project.project), unit.plain);
        }
    }

    Ok(files)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn scheme() -> LabelScheme {
        LabelScheme::new("org.ns")
    }

    fn defaults() -> RouteDefaults {
        RouteDefaults {
            default_domain: "example.org".into(),
            tls: TlsFiles {
                certificate: "/c.crt".into(),
                private_key: "/c.key".into(),
            },
        }
    }

    fn mapping(container: u16, host: u16, transport: &str) -> BindingPortMapping {
        BindingPortMapping {
            container_port: container,
            host_port: host,
            binding: "0.0.0.0".into(),
            transport: transport.into(),
        }
    }

    fn labels(pairs: &[(&str, &str)]) -> HashMap<String, String> {
        pairs.iter().map(|(k, v)| (k.to_string(), v.to_string())).collect()
    }

    #[test]
    fn test_plain_tcp_port_defaults() {
        let route = resolve_port(&scheme(), &labels(&[]), &mapping(5432, 15432, "tcp"), &defaults()).unwrap();
        assert_eq!(route.traffic, TrafficType::Tcp);
        assert_eq!(route.listen, "0.0.0.0:5432");
        assert!(route.tls);
        assert_eq!(route.domain, "example.org");
        assert_eq!(route.upstream_port, 15432);
    }

    #[test]
    fn test_http_listen_port_choice() {
        let s = scheme();
        let d = defaults();
        let port = mapping(8000, 18000, "tcp");

        let https = resolve_port(&s, &labels(&[("org.ns.type", "http")]), &port, &d).unwrap();
        assert_eq!(https.listen, "0.0.0.0:443");

        let plain = resolve_port(&s, &labels(&[("org.ns.type", "http"), ("org.ns.ssl", "false")]), &port, &d).unwrap();
        assert_eq!(plain.listen, "0.0.0.0:80");

        let nonstandard = resolve_port(&s, &labels(&[("org.ns.type", "http"), ("org.ns.8000.http.nonstandard", "true")]), &port, &d).unwrap();
        assert_eq!(nonstandard.listen, "0.0.0.0:8000");

        let overridden = resolve_port(
            &s,
            &labels(&[
                ("org.ns.type", "https"),
                ("org.ns.http.nonstandard", "true"),
                ("org.ns.port.override", "8443"),
                ("org.ns.bind", "10.0.0.1"),
            ]),
            &port,
            &d,
        )
        .unwrap();
        assert_eq!(overridden.listen, "10.0.0.1:8443");
        assert_eq!(overridden.traffic, TrafficType::Https);
    }

    #[test]
    fn test_mismatch_guard_uses_observed_type() {
        let route = resolve_port(&scheme(), &labels(&[("org.ns.type", "http")]), &mapping(53, 5353, "udp"), &defaults()).unwrap();
        assert_eq!(route.traffic, TrafficType::Udp);

        let route = resolve_port(&scheme(), &labels(&[("org.ns.type", "udp")]), &mapping(53, 5353, "tcp"), &defaults()).unwrap();
        assert_eq!(route.traffic, TrafficType::Tcp);
    }

    #[test]
    fn test_skipped_ports() {
        let s = scheme();
        let d = defaults();
        assert!(resolve_port(&s, &labels(&[("org.ns.80.hide", "true")]), &mapping(80, 8080, "tcp"), &d).is_none());
        assert!(resolve_port(&s, &labels(&[("org.ns.type", "quic")]), &mapping(80, 8080, "tcp"), &d).is_none());

        let mut v6 = mapping(80, 8080, "tcp");
        v6.binding = "::".into();
        assert!(resolve_port(&s, &labels(&[]), &v6, &d).is_none());
    }

    #[test]
    fn test_hidden_port_never_rendered() {
        let container = BindingContainer {
            name: "abc".into(),
            ports: vec![mapping(80, 8080, "tcp"), mapping(81, 8081, "tcp")],
        };
        let labels = labels(&[("org.ns.type", "http"), ("org.ns.81.hide", "true")]);
        let rendered = render_container(&scheme(), &container, &labels, &defaults());

        assert!(rendered.http.contains(":8080;"));
        assert!(!rendered.http.contains("8081"));
        assert!(!rendered.plain.contains("8081"));
    }

    #[test]
    fn test_container_splits_http_and_plain() {
        let container = BindingContainer {
            name: "abc".into(),
            ports: vec![mapping(53, 5353, "udp"), mapping(80, 8080, "tcp")],
        };
        let labels = labels(&[("org.ns.80.type", "http"), ("org.ns.80.domain", "app.example.org")]);
        let rendered = render_container(&scheme(), &container, &labels, &defaults());

        assert!(rendered.http.contains("server_name app.example.org;"));
        assert!(rendered.http.contains("proxy_pass http://0.0.0.0:8080;"));
        assert!(rendered.plain.contains("listen 0.0.0.0:53 udp;"));
    }
}
