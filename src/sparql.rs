//! Structural scan of SPARQL query text
//!
//! This is not a SPARQL parser. [`PatternExtractor`] recognizes the handful of
//! clauses that matter for access control (prolog, update keywords, `GRAPH`,
//! `FROM`, `DESCRIBE`) with token patterns and tolerates anything else.
//! Malformed text yields an empty shape, never an error.

use std::collections::{BTreeMap, BTreeSet};
use std::sync::LazyLock;

use regex::Regex;
use serde::Serialize;
use tracing::warn;

use crate::constants::MUTATING_KEYWORDS;
use crate::identity::access_target;

/// What the gatekeeper needs to know about a query
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct QueryShape {
    pub is_mutating: bool,
    pub is_construct: bool,
    pub is_describe: bool,
    /// `"p:"` → namespace
    pub declared_prefixes: BTreeMap<String, String>,
    pub referenced_graphs: BTreeSet<String>,
    pub has_graph_clause: bool,
    pub has_from_named: bool,
    /// Prefixes used in `FROM`/`DESCRIBE` without a declaration; their graphs are dropped
    pub undeclared_prefixes: BTreeSet<String>,
}

impl QueryShape {
    /// A `GRAPH` clause with no `FROM NAMED` source to bound it
    pub fn is_unbounded_graph(&self) -> bool {
        self.has_graph_clause && !self.has_from_named
    }

    /// Graphs to run access checks on, reification graphs mapped to their dataset
    pub fn access_targets(&self) -> BTreeSet<String> {
        self.referenced_graphs
            .iter()
            .map(|g| access_target(g).to_string())
            .collect()
    }
}

/// Turns query text into a [`QueryShape`]
pub trait GraphExtractor: Send + Sync {
    fn extract(&self, query: &str) -> QueryShape;
}

struct Patterns {
    sparql_keyword: Regex,
    prolog: Regex,
    prefix: Regex,
    graph_clause: Regex,
    from_named: Regex,
    from_iri: Regex,
    from_prefixed: Regex,
    describe_iri: Regex,
    describe_prefixed: Regex,
}

/// Prefix name: any run that cannot end the name or start another token
const PN: &str = r#"[^\s:/<>{}()\[\]"',;#?$\\]*"#;

// Literal patterns; a failure here is a programming error caught by the unit tests.
static PATTERNS: LazyLock<Patterns> = LazyLock::new(|| {
    let re = |p: String| Regex::new(&p).expect("static SPARQL pattern");
    Patterns {
        sparql_keyword: re(r"(?i)^\s*SPARQL\b\s*".to_string()),
        // Only the leading run of declarations
        prolog: re(format!(r"(?i)^\s*(?:(?:BASE\s*<[^>]*>|PREFIX\s+{PN}\s*:\s*<[^>]*>)\s*)*")),
        prefix: re(format!(r"(?i)\bPREFIX\s+({PN})\s*:\s*<([^>]*)>")),
        // A leading `?`/`$` would make it a variable named graph
        graph_clause: re(format!(r"(?i)(?:^|[^?$\w])GRAPH\s*(?:<|\?|\$|{PN}:)")),
        from_named: re(format!(r"(?i)(?:^|[^?$\w])FROM\s+NAMED\s*(?:<[^>]*>|{PN}:)")),
        from_iri: re(r"(?i)(?:^|[^?$\w])FROM(?:\s+NAMED)?\s*<([^>]*)>".to_string()),
        from_prefixed: re(format!(r"(?i)(?:^|[^?$\w])FROM(?:\s+NAMED)?\s+({PN}):([^\s{{}}<>]*)")),
        describe_iri: re(r"(?i)^DESCRIBE\s*<([^>]*)>".to_string()),
        describe_prefixed: re(format!(r"(?i)^DESCRIBE\s+({PN}):([^\s{{}}<>]*)")),
    }
});

/// Regex-driven [`GraphExtractor`]
#[derive(Debug, Clone, Copy, Default)]
pub struct PatternExtractor;

impl PatternExtractor {
    pub fn new() -> Self {
        PatternExtractor
    }
}

fn run_of(bytes: &[u8], at: usize, quote: u8, n: usize) -> bool {
    bytes.len() >= at + n && bytes[at..at + n].iter().all(|&b| b == quote)
}

/// Blank out `#` comments, leaving IRIs and string literals intact
fn strip_comments(query: &str) -> String {
    let bytes = query.as_bytes();
    let mut out = String::with_capacity(query.len());
    let (mut start, mut i) = (0, 0);
    while i < bytes.len() {
        match bytes[i] {
            b'#' => {
                out.push_str(&query[start..i]);
                out.push(' ');
                while i < bytes.len() && bytes[i] != b'\n' && bytes[i] != b'\r' {
                    i += 1;
                }
                start = i;
                continue;
            }
            // An IRI has no whitespace before its closing '>'
            b'<' => {
                if let Some(len) = query[i + 1..].find(|c: char| c == '>' || c.is_whitespace()) {
                    if bytes[i + 1 + len] == b'>' {
                        i += len + 2;
                        continue;
                    }
                }
            }
            // `\#` in a local name is an escaped character, not a comment
            b'\\' => {
                i += 2;
                continue;
            }
            q @ (b'"' | b'\'') => {
                let n = if run_of(bytes, i, q, 3) { 3 } else { 1 };
                let mut j = i + n;
                while j < bytes.len() {
                    if bytes[j] == b'\\' {
                        j += 2;
                    } else if run_of(bytes, j, q, n) {
                        j += n;
                        break;
                    } else if n == 1 && (bytes[j] == b'\n' || bytes[j] == b'\r') {
                        break;
                    } else {
                        j += 1;
                    }
                }
                i = j.min(bytes.len());
                continue;
            }
            _ => {}
        }
        i += 1;
    }
    out.push_str(&query[start..]);
    out
}

/// Leading alphabetic word of `body`
fn leading_keyword(body: &str) -> &str {
    let end = body
        .find(|c: char| !c.is_ascii_alphabetic())
        .unwrap_or(body.len());
    &body[..end]
}

/// Drop the `\` of escaped characters in a local name
fn unescape_local(local: &str) -> String {
    let mut out = String::with_capacity(local.len());
    let mut chars = local.chars();
    while let Some(c) = chars.next() {
        match c {
            '\\' => out.extend(chars.next()),
            c => out.push(c),
        }
    }
    out
}

fn resolve_prefixed(
    prefixes: &BTreeMap<String, String>,
    prefix: &str,
    local: &str,
    undeclared: &mut BTreeSet<String>,
) -> Option<String> {
    let key = format!("{}:", prefix);
    match prefixes.get(&key) {
        Some(ns) => Some(format!("{}{}", ns, unescape_local(local))),
        None => {
            warn!(prefix = %key, "graph reference uses an undeclared prefix; not access checked");
            undeclared.insert(key);
            None
        }
    }
}

impl GraphExtractor for PatternExtractor {
    fn extract(&self, query: &str) -> QueryShape {
        let p = &*PATTERNS;
        let text = strip_comments(query).replace(['\r', '\n'], " ");
        let text = match p.sparql_keyword.find(&text) {
            Some(m) => &text[m.end()..],
            None => text.as_str(),
        };

        let mut shape = QueryShape::default();

        // Prolog
        for caps in p.prefix.captures_iter(text) {
            shape.declared_prefixes.insert(format!("{}:", &caps[1]), caps[2].to_string());
        }
        let prolog_end = p.prolog.find(text).map(|m| m.end()).unwrap_or(0);
        let body = text[prolog_end..].trim_start();

        // Classification
        // TODO: Virtuoso `DEFINE input:default-graph-uri` pragmas ahead of the query form are not scanned
        let keyword = leading_keyword(body);
        // A declaration the prolog scan could not consume hides the real query form
        let opaque_prolog = ["PREFIX", "BASE"].iter().any(|k| k.eq_ignore_ascii_case(keyword));
        shape.is_mutating =
            opaque_prolog || MUTATING_KEYWORDS.iter().any(|k| k.eq_ignore_ascii_case(keyword));
        shape.is_construct = keyword.eq_ignore_ascii_case("CONSTRUCT");
        shape.is_describe = keyword.eq_ignore_ascii_case("DESCRIBE");
        shape.has_graph_clause = p.graph_clause.is_match(body);
        // FROM clauses are matched over the whole text, not just the body
        shape.has_from_named = p.from_named.is_match(text);

        // Referenced graphs
        let mut undeclared = BTreeSet::new();
        if shape.is_describe {
            if let Some(iri) = p.describe_iri.captures(body).and_then(|c| c.get(1)) {
                shape.referenced_graphs.insert(iri.as_str().to_string());
            } else if let Some(c) = p.describe_prefixed.captures(body) {
                let (prefix, local) = (&c[1], &c[2]);
                if let Some(g) = resolve_prefixed(&shape.declared_prefixes, prefix, local, &mut undeclared) {
                    shape.referenced_graphs.insert(g);
                }
            }
        }
        for c in p.from_iri.captures_iter(text) {
            shape.referenced_graphs.insert(c[1].to_string());
        }
        for c in p.from_prefixed.captures_iter(text) {
            let (prefix, local) = (&c[1], &c[2]);
            if let Some(g) = resolve_prefixed(&shape.declared_prefixes, prefix, local, &mut undeclared) {
                shape.referenced_graphs.insert(g);
            }
        }
        shape.undeclared_prefixes = undeclared;
        shape
    }
}
