//! What the graph needs to know about element types it does not implement.
//!
//! Component implementations are discovered elsewhere; validation only asks two questions of
//! them: does a type have a given port, and does it declare a given statistic.

use std::collections::BTreeMap;

use rustc_hash::FxHashMap;

pub trait ElementCatalog {
    /// Whether components of type `ty` expose a port named `port`.
    fn is_port_valid(&self, ty: &str, port: &str) -> bool;

    /// The enable level of statistic `stat` on type `ty`, or `None` if the type does not declare
    /// it.
    fn statistic_enable_level(&self, ty: &str, stat: &str) -> Option<u8>;
}

/// Ports must look like identifiers; `.`, `-` and `:` are allowed after the first character.
pub fn is_well_formed_port(port: &str) -> bool {
    let mut chars = port.chars();
    match chars.next() {
        Some(c) if c.is_ascii_alphabetic() || c == '_' => {}
        _ => return false,
    }
    chars.all(|c| c.is_ascii_alphanumeric() || matches!(c, '_' | '.' | '-' | ':'))
}

/// Declared ports and statistics of one element type.
#[derive(Debug, Default, Clone)]
pub struct ElementInfo {
    ports: Vec<String>,
    statistics: BTreeMap<String, u8>,
}

impl ElementInfo {
    pub fn new() -> Self {
        Self::default()
    }

    /// Declares a port. `%d` (or `%(name)d`) in the pattern matches a decimal index.
    #[must_use]
    pub fn with_port(mut self, pattern: impl Into<String>) -> Self {
        self.ports.push(normalize_pattern(&pattern.into()));
        self
    }

    #[must_use]
    pub fn with_statistic(mut self, name: impl Into<String>, enable_level: u8) -> Self {
        self.statistics.insert(name.into(), enable_level);
        self
    }

    pub fn statistics(&self) -> impl Iterator<Item = (&str, u8)> {
        self.statistics.iter().map(|(k, v)| (k.as_str(), *v))
    }

    fn has_port(&self, port: &str) -> bool {
        self.ports.iter().any(|pattern| port_matches(pattern, port))
    }
}

// "port%(num)d" -> "port%d"
fn normalize_pattern(pattern: &str) -> String {
    match (pattern.find("%("), pattern.find(")d")) {
        (Some(start), Some(end)) if start < end => {
            format!("{}%d{}", &pattern[..start], &pattern[end + 2..])
        }
        _ => pattern.to_string(),
    }
}

fn port_matches(pattern: &str, port: &str) -> bool {
    match pattern.split_once("%d") {
        None => pattern == port,
        Some((prefix, suffix)) => port
            .strip_prefix(prefix)
            .and_then(|rest| rest.strip_suffix(suffix))
            .is_some_and(|index| !index.is_empty() && index.bytes().all(|b| b.is_ascii_digit())),
    }
}

/// An in-memory catalog keyed by type name.
///
/// Types that were never registered accept any well-formed port and declare no statistics.
#[derive(Debug, Default, Clone)]
pub struct ElementRegistry {
    elements: FxHashMap<String, ElementInfo>,
}

impl ElementRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(&mut self, ty: impl Into<String>, info: ElementInfo) -> &mut Self {
        self.elements.insert(ty.into(), info);
        self
    }

    pub fn get(&self, ty: &str) -> Option<&ElementInfo> {
        self.elements.get(ty)
    }
}

impl ElementCatalog for ElementRegistry {
    fn is_port_valid(&self, ty: &str, port: &str) -> bool {
        if !is_well_formed_port(port) {
            return false;
        }
        match self.elements.get(ty) {
            Some(info) => info.has_port(port),
            None => true,
        }
    }

    fn statistic_enable_level(&self, ty: &str, stat: &str) -> Option<u8> {
        self.elements
            .get(ty)
            .and_then(|info| info.statistics.get(stat).copied())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn port_syntax() {
        assert!(is_well_formed_port("port0"));
        assert!(is_well_formed_port("_cpu.link-1"));
        assert!(!is_well_formed_port(""));
        assert!(!is_well_formed_port("0port"));
        assert!(!is_well_formed_port("bad port"));
    }

    #[test]
    fn port_patterns() {
        let mut registry = ElementRegistry::new();
        registry.register(
            "router",
            ElementInfo::new().with_port("port%(num)d").with_port("local"),
        );
        assert!(registry.is_port_valid("router", "port12"));
        assert!(registry.is_port_valid("router", "local"));
        assert!(!registry.is_port_valid("router", "port"));
        assert!(!registry.is_port_valid("router", "portx"));
        assert!(!registry.is_port_valid("router", "remote"));
        // Unregistered types only get the syntax check
        assert!(registry.is_port_valid("nic", "anything"));
        assert!(!registry.is_port_valid("nic", "1bad"));
    }

    #[test]
    fn statistic_levels() {
        let mut registry = ElementRegistry::new();
        registry.register("cache", ElementInfo::new().with_statistic("hits", 1));
        assert_eq!(registry.statistic_enable_level("cache", "hits"), Some(1));
        assert_eq!(registry.statistic_enable_level("cache", "misses"), None);
        assert_eq!(registry.statistic_enable_level("cpu", "hits"), None);
    }
}
