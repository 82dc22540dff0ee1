//! Cache key derivation
//!
//! Keys have the shape `{entity}:{operation}[:{hash}]` where the hash is
//! taken over the canonical JSON form of the sorted query params.

use lms_http::QueryParams;
use lms_http::ids::to_base36;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

/// Hash used for the params suffix of cache keys
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum KeyHash {
    /// 32-bit `h * 31 + c` over UTF-16 units, base36
    #[default]
    Rolling,
    /// First 16 hex chars of SHA-256
    Sha256,
}

impl KeyHash {
    pub fn hash(&self, input: &str) -> String {
        match self {
            KeyHash::Rolling => rolling_hash(input),
            KeyHash::Sha256 => sha256_hash(input),
        }
    }
}

pub fn rolling_hash(input: &str) -> String {
    let mut hash: i32 = 0;
    for unit in input.encode_utf16() {
        hash = hash.wrapping_mul(31).wrapping_add(i32::from(unit));
    }
    to_base36(u64::from(hash.unsigned_abs()))
}

pub fn sha256_hash(input: &str) -> String {
    let digest = hex::encode(Sha256::digest(input.as_bytes()));
    digest[..16].to_string()
}

/// Stable serialization of params; the maps are ordered so equal params
/// always produce the same string
pub fn canonical_params(params: &QueryParams) -> String {
    serde_json::to_string(params).unwrap_or_default()
}

/// Key builder for one entity
#[derive(Debug, Clone)]
pub struct CacheKeys {
    entity: String,
    hash: KeyHash,
}

impl CacheKeys {
    pub fn new(entity: impl Into<String>, hash: KeyHash) -> Self {
        Self {
            entity: entity.into(),
            hash,
        }
    }

    fn with_params(&self, operation: &str, params: &QueryParams) -> String {
        if params.is_empty() {
            format!("{}:{}", self.entity, operation)
        } else {
            format!(
                "{}:{}:{}",
                self.entity,
                operation,
                self.hash.hash(&canonical_params(params))
            )
        }
    }

    pub fn all(&self, params: &QueryParams) -> String {
        self.with_params("all", params)
    }

    pub fn count(&self, params: &QueryParams) -> String {
        self.with_params("count", params)
    }

    pub fn by_id(&self, id: &str) -> String {
        format!("{}:byId:{}", self.entity, id)
    }

    /// Patterns covering every cached list and count, bare keys included
    pub fn collection_patterns(&self) -> Vec<String> {
        vec![
            format!("{}:all", self.entity),
            format!("{}:all:*", self.entity),
            format!("{}:count", self.entity),
            format!("{}:count:*", self.entity),
        ]
    }

    pub fn by_id_pattern(&self, id: &str) -> String {
        format!("{}:byId:*{}*", self.entity, id)
    }

    /// Pattern covering every key of the entity
    pub fn entity_pattern(&self) -> String {
        format!("{}:*", self.entity)
    }
}
