use std::collections::HashMap;
use std::sync::RwLock;

use chrono::{DateTime, Utc};
use thiserror::Error;
use uuid::Uuid;

/// The revocation list could not be updated; the token is still live.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
#[error("revocation list unavailable")]
pub struct DenylistUnavailable;

/// Revoked token ids, kept only until the token would have expired anyway.
///
/// Intended for a single process; a multi-node deployment needs a shared
/// backing store behind the same interface.
#[derive(Debug, Default)]
pub struct Denylist {
    revoked: RwLock<HashMap<Uuid, i64>>,
}

impl Denylist {
    pub fn new() -> Self {
        Self::default()
    }

    /// Revoke `jti` until `exp` (unix seconds). Expired entries are pruned.
    pub fn revoke(&self, jti: Uuid, exp: i64, now: DateTime<Utc>) -> Result<(), DenylistUnavailable> {
        let mut map = self.revoked.write().map_err(|_| DenylistUnavailable)?;
        let now = now.timestamp();
        map.retain(|_, until| *until >= now);
        map.insert(jti, exp);
        Ok(())
    }

    pub fn is_revoked(&self, jti: &Uuid) -> bool {
        match self.revoked.read() {
            Ok(map) => map.contains_key(jti),
            // Fail closed.
            Err(_) => true,
        }
    }

    pub fn len(&self) -> usize {
        self.revoked.read().map(|m| m.len()).unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
