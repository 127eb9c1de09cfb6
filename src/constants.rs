//! Permission constants and reserved identity markers

// CRUD bit constants
pub const CREATE: u8 = 1;
pub const READ: u8 = 1 << 1;
pub const UPDATE: u8 = 1 << 2;
pub const DELETE: u8 = 1 << 3;
pub const ALL: u8 = CREATE | READ | UPDATE | DELETE;

/// Registered identity of a public grant (any requester)
pub const WILDCARD_IDENTITY: &str = "0.0.0.0";

/// Marker for identities resolved relative to the requester
pub const SELF_IDENTITY: &str = "self";

/// Separates a system identity from one of its delegated accounts
pub const DELEGATION_DELIMITER: &str = "::";

/// Suffix of the statement-metadata graph paired with a dataset
pub const REIFICATION_SUFFIX: &str = "reification/";

/// Largest slice the SPARQL endpoint hands out in one request
pub const DEFAULT_MAX_LIMIT: u32 = 2000;

// Leading keywords of SPARQL Update requests
pub const MUTATING_KEYWORDS: &[&str] = &[
    "MODIFY", "DELETE", "INSERT", "LOAD", "CLEAR", "CREATE", "DROP",
    "WITH", "ADD", "MOVE", "COPY",
];

// Capability name mappings
const CAPS: &[(&str, u8)] = &[
    ("create", CREATE),
    ("read", READ),
    ("update", UPDATE),
    ("delete", DELETE),
];

/// Convert a CRUD mask to a list of names
pub fn caps_to_names(mask: u8) -> Vec<&'static str> {
    CAPS.iter()
        .filter(|(_, b)| mask & b == *b)
        .map(|(n, _)| *n)
        .collect()
}

/// Convert a list of names to a CRUD mask (unknown names are ignored)
pub fn names_to_caps(names: &[&str]) -> u8 {
    names
        .iter()
        .filter_map(|n| CAPS.iter().find(|(k, _)| k.eq_ignore_ascii_case(n)).map(|(_, v)| v))
        .fold(0, |a, b| a | b)
}
