//! LMDB-backed grant store
//!
//! Storage layout (keys are `keys::build_key` tuples):
//! - `grants`: grant_id → (identity, dataset)
//! - `by_dataset`: (dataset, identity, grant_id) → crud mask
//! - `by_identity`: (identity, dataset, grant_id) → crud mask
//! - `ws_access`: (grant_id, web_service) → epoch
//! - `services`: web_service → epoch

use std::collections::BTreeSet;
use std::path::Path;

use async_trait::async_trait;
use heed::types::{Bytes, Str, U64};
use heed::{Database, Env, EnvOpenOptions, RoTxn, RwTxn};
use tracing::debug;

use crate::constants::{DELEGATION_DELIMITER, SELF_IDENTITY};
use crate::error::{Result, WsfError};
use crate::grant::{AccessGrant, Crud};
use crate::identity::split_delegated;
use crate::keys::{build_key, build_prefix, get_part, parse_key};
use crate::store::GrantStore;

// Database type aliases
pub type Db = Database<Bytes, U64<byteorder::BigEndian>>;
pub type DbStr = Database<Str, Bytes>;
pub type DbU64 = Database<Str, U64<byteorder::BigEndian>>;

fn current_epoch() -> u64 {
    std::time::SystemTime::now()
        .duration_since(std::time::UNIX_EPOCH)
        .map(|d| d.as_millis() as u64)
        .unwrap_or(0)
}

/// Bidirectional index: fwd[a,b,c] and rev[b,a,c] stay in sync
#[derive(Clone, Copy)]
pub struct IndexPair {
    pub fwd: Db,
    pub rev: Db,
}

impl IndexPair {
    #[inline]
    pub fn put(&self, tx: &mut RwTxn, a: &str, b: &str, c: &str, v: u64) -> Result<()> {
        self.fwd.put(tx, &build_key(&[a, b, c]), &v)?;
        self.rev.put(tx, &build_key(&[b, a, c]), &v)?;
        Ok(())
    }

    #[inline]
    pub fn del(&self, tx: &mut RwTxn, a: &str, b: &str, c: &str) -> Result<bool> {
        let r = self.fwd.delete(tx, &build_key(&[a, b, c]))?;
        self.rev.delete(tx, &build_key(&[b, a, c]))?;
        Ok(r)
    }

    /// (b, c, v) entries under a fwd prefix of `a` (and optionally `b`)
    pub fn list_fwd(&self, tx: &RoTxn, parts: &[&str]) -> Result<Vec<(String, String, String, u64)>> {
        Self::list_pfx(tx, &self.fwd, parts)
    }

    pub fn list_rev(&self, tx: &RoTxn, parts: &[&str]) -> Result<Vec<(String, String, String, u64)>> {
        Self::list_pfx(tx, &self.rev, parts)
    }

    fn list_pfx(tx: &RoTxn, db: &Db, parts: &[&str]) -> Result<Vec<(String, String, String, u64)>> {
        let mut r = Vec::new();
        for item in db.prefix_iter(tx, &build_prefix(parts))? {
            let (k, v) = item?;
            if let [a, b, c] = parse_key(k).as_slice() {
                r.push((a.to_string(), b.to_string(), c.to_string(), v));
            }
        }
        Ok(r)
    }
}

/// All database handles
#[derive(Clone, Copy)]
pub struct Dbs {
    pub grants: DbStr,
    /// fwd: by dataset, rev: by identity
    pub access: IndexPair,
    pub ws_access: Db,
    pub services: DbU64,
}

/// Grant store persisted in an LMDB environment
pub struct LmdbGrantStore {
    env: Env,
    dbs: Dbs,
}

impl LmdbGrantStore {
    /// Open (or create) the store at `path`
    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        std::fs::create_dir_all(path)?;
        // SAFETY: LMDB requires no other processes access this path concurrently during open.
        let env = unsafe {
            EnvOpenOptions::new()
                .map_size(1 << 30)
                .max_dbs(6)
                .open(path)?
        };
        let mut tx = env.write_txn()?;
        let dbs = Dbs {
            grants: env.create_database(&mut tx, Some("grants"))?,
            access: IndexPair {
                fwd: env.create_database(&mut tx, Some("by_dataset"))?,
                rev: env.create_database(&mut tx, Some("by_identity"))?,
            },
            ws_access: env.create_database(&mut tx, Some("ws_access"))?,
            services: env.create_database(&mut tx, Some("services"))?,
        };
        tx.commit()?;
        debug!(path = %path.display(), "grant store opened");
        Ok(LmdbGrantStore { env, dbs })
    }

    /// Execute a read-only operation
    #[inline]
    pub fn read<T, F: FnOnce(&Dbs, &RoTxn) -> Result<T>>(&self, f: F) -> Result<T> {
        let tx = self.env.read_txn()?;
        f(&self.dbs, &tx)
    }

    /// Execute a write operation in a single committed transaction
    pub fn write<T, F: FnOnce(&Dbs, &mut RwTxn) -> Result<T>>(&self, f: F) -> Result<T> {
        let mut tx = self.env.write_txn()?;
        let r = f(&self.dbs, &mut tx)?;
        tx.commit()?;
        Ok(r)
    }

    /// Create or replace a grant together with its endpoint restrictions
    pub fn put_grant(&self, grant: &AccessGrant) -> Result<()> {
        validate_identity(&grant.registered_identity)?;
        if grant.dataset.is_empty() || grant.id.is_empty() {
            return Err(WsfError::InvalidGrant("grant id and dataset are required".into()));
        }
        self.write(|d, tx| {
            remove_grant(d, tx, &grant.id)?;
            d.grants.put(tx, &grant.id, &build_key(&[grant.registered_identity.as_str(), grant.dataset.as_str()]))?;
            d.access.put(tx, &grant.dataset, &grant.registered_identity, &grant.id, grant.crud.mask() as u64)?;
            let epoch = current_epoch();
            for ws in &grant.web_service_access {
                d.ws_access.put(tx, &build_key(&[grant.id.as_str(), ws.as_str()]), &epoch)?;
            }
            Ok(())
        })?;
        debug!(grant = %grant.id, identity = %grant.registered_identity, dataset = %grant.dataset, crud = %grant.crud, "grant stored");
        Ok(())
    }

    /// Delete a grant and its endpoint restrictions
    pub fn delete_grant(&self, id: &str) -> Result<bool> {
        self.write(|d, tx| remove_grant(d, tx, id))
    }

    pub fn get_grant(&self, id: &str) -> Result<Option<AccessGrant>> {
        self.read(|d, tx| {
            let Some(row) = d.grants.get(tx, id)? else { return Ok(None) };
            let (Some(identity), Some(dataset)) = (get_part(row, 0), get_part(row, 1)) else {
                return Ok(None);
            };
            let mask = d.access.fwd.get(tx, &build_key(&[dataset, identity, id]))?.unwrap_or(0);
            let mut g = AccessGrant::new(id, identity, dataset, Crud::from_mask(mask as u8));
            g.web_service_access = ws_for(d, tx, id)?;
            Ok(Some(g))
        })
    }

    /// Register a web-service endpoint to the network
    pub fn register_web_service(&self, uri: &str) -> Result<()> {
        self.write(|d, tx| Ok(d.services.put(tx, uri, &current_epoch())?))
    }

    pub fn unregister_web_service(&self, uri: &str) -> Result<bool> {
        self.write(|d, tx| Ok(d.services.delete(tx, uri)?))
    }

    /// Clear all databases
    pub fn clear(&self) -> Result<()> {
        self.write(|d, tx| {
            d.grants.clear(tx)?;
            d.access.fwd.clear(tx)?;
            d.access.rev.clear(tx)?;
            d.ws_access.clear(tx)?;
            d.services.clear(tx)?;
            Ok(())
        })
    }
}

/// Stored identities are concrete; delegated accounts may not nest the delimiter.
fn validate_identity(identity: &str) -> Result<()> {
    if identity.is_empty() {
        return Err(WsfError::InvalidIdentity("empty identity".into()));
    }
    if identity
        .get(..SELF_IDENTITY.len())
        .map(|p| p.eq_ignore_ascii_case(SELF_IDENTITY))
        .unwrap_or(false)
    {
        return Err(WsfError::InvalidIdentity(format!("{} must be resolved before it is stored", identity)));
    }
    if let (_, Some(account)) = split_delegated(identity) {
        if account.is_empty() || account.contains(DELEGATION_DELIMITER) {
            return Err(WsfError::InvalidIdentity(identity.to_string()));
        }
    }
    Ok(())
}

fn remove_grant(d: &Dbs, tx: &mut RwTxn, id: &str) -> Result<bool> {
    let row = d.grants.get(tx, id)?.map(|r| r.to_vec());
    let Some(row) = row else { return Ok(false) };
    if let [identity, dataset] = parse_key(&row).as_slice() {
        d.access.del(tx, dataset, identity, id)?;
    }
    let stale: Vec<Vec<u8>> = d
        .ws_access
        .prefix_iter(tx, &build_prefix(&[id]))?
        .map(|item| item.map(|(k, _)| k.to_vec()))
        .collect::<std::result::Result<_, _>>()?;
    for k in stale {
        d.ws_access.delete(tx, &k)?;
    }
    d.grants.delete(tx, id)?;
    Ok(true)
}

fn ws_for(d: &Dbs, tx: &RoTxn, id: &str) -> Result<BTreeSet<String>> {
    let mut r = BTreeSet::new();
    for item in d.ws_access.prefix_iter(tx, &build_prefix(&[id]))? {
        let (k, _) = item?;
        if let [grant, ws] = parse_key(k).as_slice() {
            if *grant == id {
                r.insert(ws.to_string());
            }
        }
    }
    Ok(r)
}

fn rows_to_grants(
    d: &Dbs,
    tx: &RoTxn,
    rows: Vec<(String, String, String, u64)>,
    by_dataset: bool,
    with_ws: bool,
) -> Result<Vec<AccessGrant>> {
    rows.into_iter()
        .map(|(a, b, id, mask)| {
            let (dataset, identity) = if by_dataset { (a, b) } else { (b, a) };
            let mut g = AccessGrant::new(&id, &identity, &dataset, Crud::from_mask(mask as u8));
            if with_ws {
                g.web_service_access = ws_for(d, tx, &id)?;
            }
            Ok(g)
        })
        .collect()
}

#[async_trait]
impl GrantStore for LmdbGrantStore {
    async fn query_grants(&self, dataset: &str, identity: &str) -> Result<Vec<AccessGrant>> {
        self.read(|d, tx| {
            let rows = d.access.list_fwd(tx, &[dataset, identity])?;
            rows_to_grants(d, tx, rows, true, false)
        })
    }

    async fn query_web_service_access(&self, grant_id: &str) -> Result<BTreeSet<String>> {
        self.read(|d, tx| ws_for(d, tx, grant_id))
    }

    async fn fetch_grants(&self, dataset: &str, identity: &str) -> Result<Vec<AccessGrant>> {
        self.read(|d, tx| {
            let rows = d.access.list_fwd(tx, &[dataset, identity])?;
            rows_to_grants(d, tx, rows, true, true)
        })
    }

    async fn grants_for_identity(&self, identity: &str) -> Result<Vec<AccessGrant>> {
        self.read(|d, tx| {
            let rows = d.access.list_rev(tx, &[identity])?;
            rows_to_grants(d, tx, rows, false, true)
        })
    }

    async fn grants_on_dataset(&self, dataset: &str) -> Result<Vec<AccessGrant>> {
        self.read(|d, tx| {
            let rows = d.access.list_fwd(tx, &[dataset])?;
            rows_to_grants(d, tx, rows, true, true)
        })
    }

    async fn web_services(&self) -> Result<BTreeSet<String>> {
        self.read(|d, tx| {
            let mut r = BTreeSet::new();
            for item in d.services.iter(tx)? {
                let (k, _) = item?;
                r.insert(k.to_string());
            }
            Ok(r)
        })
    }
}
