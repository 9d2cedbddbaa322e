//! Resolution of client-minted identifiers to canonical UUIDs.

use std::collections::HashMap;
use std::fmt;
use std::str::FromStr;

use log::debug;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::errors::{Error, Result};
use crate::survey::EntityKind;

/// Namespace for ids derived from non-UUID client identifiers.
pub const IDENTITY_NAMESPACE: Uuid = Uuid::from_u128(0x6f1c_2a4e_93b7_5d08_a1e5_c4f2_7b3d_9e60);

/// What a prefixed collection does with an id that carries no canonical UUID.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PrefixedIdFallback {
    /// A fresh random id per distinct raw id per run.
    #[default]
    Random,
    /// Derived like every other collection.
    Deterministic,
}

impl FromStr for PrefixedIdFallback {
    type Err = Error;

    fn from_str(value: &str) -> Result<Self> {
        match value.trim().to_ascii_lowercase().as_str() {
            "random" => Ok(Self::Random),
            "deterministic" => Ok(Self::Deterministic),
            other => Err(Error::validation(format!(
                "Unknown prefixed id fallback '{}'",
                other
            ))),
        }
    }
}

impl fmt::Display for PrefixedIdFallback {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Random => f.write_str("random"),
            Self::Deterministic => f.write_str("deterministic"),
        }
    }
}

/// Derives the canonical id of a non-UUID client identifier.
pub fn derive_id(raw: &str) -> Uuid {
    Uuid::new_v5(&IDENTITY_NAMESPACE, raw.as_bytes())
}

/// Strips a recognized category code (`IF`, `IF-`, `IF_`, `IF:`) from a client id.
fn strip_category_code(raw: &str) -> Option<&str> {
    let code = raw.get(..2)?;
    let known = EntityKind::SYNC_ORDER
        .into_iter()
        .filter_map(EntityKind::id_prefix)
        .any(|prefix| prefix.eq_ignore_ascii_case(code));
    if !known {
        return None;
    }
    let rest = &raw[2..];
    Some(rest.strip_prefix(['-', '_', ':']).unwrap_or(rest))
}

/// Run-scoped memo of resolved identifiers.
///
/// Built once per sync call and dropped with it. Resolving the same raw id
/// for the same kind always yields the same canonical id, and two different
/// raw ids never share one.
#[derive(Debug, Default)]
pub struct IdentityMap {
    fallback: PrefixedIdFallback,
    resolved: HashMap<(EntityKind, String), Uuid>,
    issued: HashMap<(EntityKind, Uuid), String>,
}

impl IdentityMap {
    pub fn new(fallback: PrefixedIdFallback) -> Self {
        Self {
            fallback,
            resolved: HashMap::new(),
            issued: HashMap::new(),
        }
    }

    pub fn len(&self) -> usize {
        self.resolved.len()
    }

    pub fn is_empty(&self) -> bool {
        self.resolved.is_empty()
    }

    pub fn resolve(&mut self, kind: EntityKind, raw: &str) -> Result<Uuid> {
        let raw = raw.trim();
        if raw.is_empty() {
            return Err(Error::Identity(format!("Empty identifier in {}", kind)));
        }
        if let Some(id) = self.resolved.get(&(kind, raw.to_string())) {
            return Ok(*id);
        }

        // Literal ids are keyed by their canonical text so that `IF-<uuid>` and
        // `<uuid>` name the same entity.
        let (id, identity_key) = match self.literal(kind, raw) {
            Some(id) => (id, id.to_string()),
            None => (self.mint(kind, raw), raw.to_string()),
        };

        if let Some(previous) = self.issued.get(&(kind, id)) {
            if *previous != identity_key {
                return Err(Error::Identity(format!(
                    "Identifiers '{}' and '{}' in {} resolve to the same id {}",
                    previous, raw, kind, id
                )));
            }
        } else {
            self.issued.insert((kind, id), identity_key);
        }

        self.resolved.insert((kind, raw.to_string()), id);
        Ok(id)
    }

    fn literal(&self, kind: EntityKind, raw: &str) -> Option<Uuid> {
        if let Ok(id) = Uuid::parse_str(raw) {
            return Some(id);
        }
        kind.id_prefix()?;
        strip_category_code(raw).and_then(|rest| Uuid::parse_str(rest).ok())
    }

    fn mint(&self, kind: EntityKind, raw: &str) -> Uuid {
        match (kind.id_prefix(), self.fallback) {
            (Some(_), PrefixedIdFallback::Random) => {
                let id = Uuid::new_v4();
                debug!(
                    "[Sync] Minted random id {} for {} identifier '{}'",
                    id, kind, raw
                );
                id
            }
            _ => derive_id(raw),
        }
    }
}
