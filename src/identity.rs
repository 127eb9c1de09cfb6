//! Identity resolution for the `self` / `self::account` delegation convention

use crate::constants::{DELEGATION_DELIMITER, REIFICATION_SUFFIX, SELF_IDENTITY};

/// Resolve a registered identity relative to the requester.
///
/// - empty input resolves to the requester
/// - `self` resolves to the requester
/// - `self::acct` resolves to `<requester>::acct`
/// - anything else is used verbatim
pub fn resolve(registered: &str, requester: &str) -> String {
    if registered.is_empty() {
        return requester.to_string();
    }
    let starts_with_self = registered
        .get(..SELF_IDENTITY.len())
        .map(|p| p.eq_ignore_ascii_case(SELF_IDENTITY))
        .unwrap_or(false);
    if !starts_with_self {
        return registered.to_string();
    }
    match registered.find(DELEGATION_DELIMITER) {
        Some(pos) => format!(
            "{}{}{}",
            requester,
            DELEGATION_DELIMITER,
            &registered[pos + DELEGATION_DELIMITER.len()..]
        ),
        None => requester.to_string(),
    }
}

/// Split a resolved identity into its base and delegated account, if any
pub fn split_delegated(identity: &str) -> (&str, Option<&str>) {
    match identity.split_once(DELEGATION_DELIMITER) {
        Some((base, account)) => (base, Some(account)),
        None => (identity, None),
    }
}

/// Dataset a graph is access-controlled through (reification graphs map to their parent)
pub fn access_target(graph: &str) -> &str {
    graph.strip_suffix(REIFICATION_SUFFIX).unwrap_or(graph)
}

/// The pair of identities attached to every request
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RequestIdentity {
    registered: String,
    requester: String,
}

impl RequestIdentity {
    /// `registered_ip` may be empty or use the `self` convention; `requester_ip`
    /// comes from the transport layer.
    pub fn new(registered_ip: &str, requester_ip: &str) -> Self {
        RequestIdentity {
            registered: resolve(registered_ip, requester_ip),
            requester: requester_ip.to_string(),
        }
    }

    pub fn registered(&self) -> &str {
        &self.registered
    }

    pub fn requester(&self) -> &str {
        &self.requester
    }

    /// A system acting on behalf of another identity
    pub fn is_delegated(&self) -> bool {
        self.registered != self.requester
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn self_prefix_is_case_insensitive() {
        assert_eq!(resolve("SELF", "10.0.0.1"), "10.0.0.1");
        assert_eq!(resolve("Self::bob", "10.0.0.1"), "10.0.0.1::bob");
    }

    #[test]
    fn account_keeps_text_after_first_delimiter() {
        assert_eq!(resolve("self::a::b", "1.1.1.1"), "1.1.1.1::a::b");
        assert_eq!(split_delegated("1.1.1.1::acct"), ("1.1.1.1", Some("acct")));
        assert_eq!(split_delegated("1.1.1.1"), ("1.1.1.1", None));
    }

    #[test]
    fn selfish_identity_still_resolves() {
        // Matches on the leading four characters only
        assert_eq!(resolve("selfhost", "2.2.2.2"), "2.2.2.2");
    }

    #[test]
    fn reification_graph_maps_to_parent() {
        assert_eq!(access_target("http://ex.org/d1reification/"), "http://ex.org/d1");
        assert_eq!(access_target("http://ex.org/d1"), "http://ex.org/d1");
    }
}
