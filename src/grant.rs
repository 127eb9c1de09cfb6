//! Access grant records

use std::collections::BTreeSet;
use std::fmt;

use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

use crate::constants::{caps_to_names, ALL, CREATE, DELETE, READ, UPDATE, WILDCARD_IDENTITY};

/// A CRUD operation requested on a dataset
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Operation {
    Create,
    Read,
    Update,
    Delete,
}

impl Operation {
    #[inline]
    pub fn bit(self) -> u8 {
        match self {
            Operation::Create => CREATE,
            Operation::Read => READ,
            Operation::Update => UPDATE,
            Operation::Delete => DELETE,
        }
    }
}

impl fmt::Display for Operation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Operation::Create => "create",
            Operation::Read => "read",
            Operation::Update => "update",
            Operation::Delete => "delete",
        })
    }
}

/// Create/read/update/delete flags of a grant, packed as a bitmask
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Crud(u8);

impl Crud {
    pub const NONE: Crud = Crud(0);
    pub const ALL: Crud = Crud(ALL);

    pub fn new(create: bool, read: bool, update: bool, delete: bool) -> Self {
        let mut m = 0;
        if create {
            m |= CREATE;
        }
        if read {
            m |= READ;
        }
        if update {
            m |= UPDATE;
        }
        if delete {
            m |= DELETE;
        }
        Crud(m)
    }

    #[inline]
    pub fn from_mask(mask: u8) -> Self {
        Crud(mask & ALL)
    }

    #[inline]
    pub fn mask(self) -> u8 {
        self.0
    }

    #[inline]
    pub fn allows(self, op: Operation) -> bool {
        self.0 & op.bit() != 0
    }

    #[inline]
    pub fn any(self) -> bool {
        self.0 != 0
    }
}

impl fmt::Display for Crud {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.0 == 0 {
            return f.write_str("none");
        }
        f.write_str(&caps_to_names(self.0).join("+"))
    }
}

/// A stored record authorizing an identity on a dataset
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AccessGrant {
    pub id: String,
    pub registered_identity: String,
    pub dataset: String,
    pub crud: Crud,
    /// Endpoints this grant is restricted to; empty means every endpoint
    pub web_service_access: BTreeSet<String>,
}

impl AccessGrant {
    pub fn new(id: &str, registered_identity: &str, dataset: &str, crud: Crud) -> Self {
        AccessGrant {
            id: id.to_string(),
            registered_identity: registered_identity.to_string(),
            dataset: dataset.to_string(),
            crud,
            web_service_access: BTreeSet::new(),
        }
    }

    /// Restrict the grant to the given web-service endpoints
    pub fn restricted_to<I, S>(mut self, services: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.web_service_access.extend(services.into_iter().map(Into::into));
        self
    }

    pub fn is_wildcard(&self) -> bool {
        self.registered_identity == WILDCARD_IDENTITY
    }

    /// Whether this grant lets its holder perform `op` through `web_service`
    pub fn authorizes(&self, op: Operation, web_service: &str) -> bool {
        self.crud.allows(op)
            && (self.web_service_access.is_empty() || self.web_service_access.contains(web_service))
    }
}

/// Stable grant URI for an (identity, dataset) pair under the network graph
pub fn derive_grant_id(wsf_graph: &str, identity: &str, dataset: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(identity.as_bytes());
    hasher.update([0u8]);
    hasher.update(dataset.as_bytes());
    let digest: String = hasher.finalize().iter().map(|b| format!("{:02x}", b)).collect();
    format!("{}access/{}", wsf_graph, &digest[..32])
}
