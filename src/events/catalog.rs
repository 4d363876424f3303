//! Runtime event classification rules.
//!
//! # Responsibilities
//! - Name every runtime event the daemon recognises
//! - Classify a `(Type, status)` pair to exactly one rule
//! - Report catalog ambiguities so they fail in tests, not at runtime
//!
//! # Design Decisions
//! - Lookup is keyed by `(kind, exact status)` first; prefix matching is
//!   only the fallback for statuses carrying extra detail
//!   (`health_status: healthy`, `exec_start: sh -c ...`)
//! - The prefix fallback picks the longest matching prefix, so rule order
//!   in the table never matters

use std::collections::HashMap;
use std::fmt;

use serde::Serialize;

/// Runtime object an event is about (the `Type` field).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ResourceKind {
    Container,
    Image,
    Plugin,
    Volume,
    Network,
    Daemon,
    Service,
    Node,
    Secret,
    Config,
}

impl ResourceKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            ResourceKind::Container => "container",
            ResourceKind::Image => "image",
            ResourceKind::Plugin => "plugin",
            ResourceKind::Volume => "volume",
            ResourceKind::Network => "network",
            ResourceKind::Daemon => "daemon",
            ResourceKind::Service => "service",
            ResourceKind::Node => "node",
            ResourceKind::Secret => "secret",
            ResourceKind::Config => "config",
        }
    }

    /// Parse the runtime's `Type` field. Case sensitive.
    pub fn from_type(value: &str) -> Option<Self> {
        Some(match value {
            "container" => ResourceKind::Container,
            "image" => ResourceKind::Image,
            "plugin" => ResourceKind::Plugin,
            "volume" => ResourceKind::Volume,
            "network" => ResourceKind::Network,
            "daemon" => ResourceKind::Daemon,
            "service" => ResourceKind::Service,
            "node" => ResourceKind::Node,
            "secret" => ResourceKind::Secret,
            "config" => ResourceKind::Config,
            _ => return None,
        })
    }
}

impl fmt::Display for ResourceKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A classification rule: resource kind plus status prefix.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub struct EventDefinition {
    pub kind: ResourceKind,
    pub prefix: &'static str,
}

impl EventDefinition {
    pub const fn new(kind: ResourceKind, prefix: &'static str) -> Self {
        Self { kind, prefix }
    }

    /// Composite identity, `<kind>.<prefix>`.
    pub fn key(&self) -> String {
        format!("{}.{}", self.kind, self.prefix)
    }

    pub fn matches(&self, kind: ResourceKind, status: &str) -> bool {
        self.kind == kind && status.starts_with(self.prefix)
    }
}

impl fmt::Display for EventDefinition {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{}", self.kind, self.prefix)
    }
}

const fn rule(kind: ResourceKind, prefix: &'static str) -> EventDefinition {
    EventDefinition::new(kind, prefix)
}

use ResourceKind::{Config, Container, Daemon, Image, Network, Node, Plugin, Secret, Service, Volume};

pub const CONTAINER_DESTROY: EventDefinition = rule(Container, "destroy");
pub const CONTAINER_DETACH: EventDefinition = rule(Container, "detach");
pub const CONTAINER_DIE: EventDefinition = rule(Container, "die");
pub const CONTAINER_HEALTH_STATUS: EventDefinition = rule(Container, "health_status");
pub const CONTAINER_KILL: EventDefinition = rule(Container, "kill");
pub const CONTAINER_OOM: EventDefinition = rule(Container, "oom");
pub const CONTAINER_RESTART: EventDefinition = rule(Container, "restart");
pub const CONTAINER_START: EventDefinition = rule(Container, "start");
pub const CONTAINER_STOP: EventDefinition = rule(Container, "stop");

/// Every event the daemon recognises.
pub const BUILTIN_RULES: [EventDefinition; 58] = [
    rule(Container, "attach"),
    rule(Container, "commit"),
    rule(Container, "copy"),
    rule(Container, "create"),
    CONTAINER_DESTROY,
    CONTAINER_DETACH,
    CONTAINER_DIE,
    rule(Container, "exec_create"),
    rule(Container, "exec_detach"),
    rule(Container, "exec_die"),
    rule(Container, "exec_start"),
    rule(Container, "export"),
    CONTAINER_HEALTH_STATUS,
    CONTAINER_KILL,
    CONTAINER_OOM,
    rule(Container, "pause"),
    rule(Container, "rename"),
    rule(Container, "resize"),
    CONTAINER_RESTART,
    CONTAINER_START,
    CONTAINER_STOP,
    rule(Container, "top"),
    rule(Container, "unpause"),
    rule(Container, "update"),
    rule(Image, "delete"),
    rule(Image, "import"),
    rule(Image, "load"),
    rule(Image, "pull"),
    rule(Image, "push"),
    rule(Image, "save"),
    rule(Image, "tag"),
    rule(Image, "untag"),
    rule(Plugin, "enable"),
    rule(Plugin, "disable"),
    rule(Plugin, "install"),
    rule(Plugin, "remove"),
    rule(Volume, "create"),
    rule(Volume, "destroy"),
    rule(Volume, "mount"),
    rule(Volume, "unmount"),
    rule(Network, "create"),
    rule(Network, "connect"),
    rule(Network, "destroy"),
    rule(Network, "disconnect"),
    rule(Network, "remove"),
    rule(Daemon, "reload"),
    rule(Service, "create"),
    rule(Service, "remove"),
    rule(Service, "update"),
    rule(Node, "create"),
    rule(Node, "remove"),
    rule(Node, "update"),
    rule(Secret, "create"),
    rule(Secret, "remove"),
    rule(Secret, "update"),
    rule(Config, "create"),
    rule(Config, "remove"),
    rule(Config, "update"),
];

/// Container lifecycle transitions that can change published ports.
pub const REBIND_TRIGGERS: [EventDefinition; 8] = [
    CONTAINER_DESTROY,
    CONTAINER_DETACH,
    CONTAINER_DIE,
    CONTAINER_KILL,
    CONTAINER_RESTART,
    CONTAINER_OOM,
    CONTAINER_START,
    CONTAINER_STOP,
];

/// Whether an event of this rule should trigger a binding pass.
pub fn is_rebind_trigger(rule: &EventDefinition) -> bool {
    REBIND_TRIGGERS.contains(rule)
}

/// Indexed set of rules.
#[derive(Debug, Clone)]
pub struct EventCatalog {
    exact: HashMap<ResourceKind, HashMap<&'static str, EventDefinition>>,
    by_kind: HashMap<ResourceKind, Vec<EventDefinition>>,
}

impl EventCatalog {
    pub fn new(rules: &[EventDefinition]) -> Self {
        let mut exact: HashMap<ResourceKind, HashMap<&'static str, EventDefinition>> = HashMap::new();
        let mut by_kind: HashMap<ResourceKind, Vec<EventDefinition>> = HashMap::new();

        for rule in rules {
            exact.entry(rule.kind).or_default().insert(rule.prefix, *rule);
            by_kind.entry(rule.kind).or_default().push(*rule);
        }
        for rules in by_kind.values_mut() {
            // longest prefix first
            rules.sort_by(|a, b| b.prefix.len().cmp(&a.prefix.len()).then(a.prefix.cmp(b.prefix)));
        }

        Self { exact, by_kind }
    }

    pub fn builtin() -> Self {
        Self::new(&BUILTIN_RULES)
    }

    /// Classify a raw `(Type, status)` pair.
    pub fn classify(&self, kind: &str, status: &str) -> Option<EventDefinition> {
        let kind = ResourceKind::from_type(kind)?;

        if let Some(rule) = self.exact.get(&kind).and_then(|rules| rules.get(status)) {
            return Some(*rule);
        }

        self.by_kind
            .get(&kind)?
            .iter()
            .find(|rule| rule.matches(kind, status))
            .copied()
    }

    /// Pairs of same-kind rules where one prefix is a prefix of the other.
    pub fn ambiguities(&self) -> Vec<(EventDefinition, EventDefinition)> {
        let mut found = Vec::new();
        for rules in self.by_kind.values() {
            for (i, a) in rules.iter().enumerate() {
                for b in &rules[i + 1..] {
                    if a.prefix.starts_with(b.prefix) || b.prefix.starts_with(a.prefix) {
                        found.push((*a, *b));
                    }
                }
            }
        }
        found
    }

    pub fn len(&self) -> usize {
        self.exact.values().map(HashMap::len).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl Default for EventCatalog {
    fn default() -> Self {
        Self::builtin()
    }
}
