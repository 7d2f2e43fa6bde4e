//! CSI Identifiers
//!
//! Protocol-visible handle of a journalled object:
//!
//! ```text
//! 0001-0009-cluster-1-0000000000000003-<object uuid>
//! ^    ^    ^         ^                ^
//! |    |    |         |                object UUID (36 chars)
//! |    |    |         location ID (16 hex)
//! |    |    cluster ID
//! |    cluster ID length (4 hex)
//! encoding version (4 hex)
//! ```

use crate::error::{Error, Result};
use uuid::Uuid;

/// Current encoding version
pub const IDENTIFIER_VERSION: u16 = 1;

/// Length of every field but the cluster ID, separators included
const KNOWN_FIELD_SIZE: usize = 64;

/// Longest identifier the protocol accepts
pub const MAX_IDENTIFIER_LEN: usize = 128;

const UUID_LEN: usize = 36;

/// Decoded CSI identifier
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CsiIdentifier {
    pub cluster_id: String,
    /// Backend location (pool ID) the object lives in
    pub location_id: i64,
    pub object_uuid: Uuid,
}

impl CsiIdentifier {
    pub fn new(cluster_id: impl Into<String>, location_id: i64, object_uuid: Uuid) -> Self {
        Self {
            cluster_id: cluster_id.into(),
            location_id,
            object_uuid,
        }
    }

    /// Encode into the protocol handle
    pub fn compose(&self) -> Result<String> {
        if KNOWN_FIELD_SIZE + self.cluster_id.len() > MAX_IDENTIFIER_LEN {
            return Err(Error::InvalidIdentifier {
                id: self.cluster_id.clone(),
                reason: format!(
                    "cluster ID longer than {} bytes",
                    MAX_IDENTIFIER_LEN - KNOWN_FIELD_SIZE
                ),
            });
        }

        Ok(format!(
            "{:04x}-{:04x}-{}-{:016x}-{}",
            IDENTIFIER_VERSION,
            self.cluster_id.len(),
            self.cluster_id,
            self.location_id,
            self.object_uuid
        ))
    }

    /// Decode a protocol handle
    pub fn decompose(id: &str) -> Result<Self> {
        let invalid = |reason: &str| Error::InvalidIdentifier {
            id: id.to_string(),
            reason: reason.to_string(),
        };

        if id.len() < KNOWN_FIELD_SIZE {
            return Err(invalid("too short"));
        }

        let version = hex_field(id, 0, 4).ok_or_else(|| invalid("bad version"))?;
        if version != u64::from(IDENTIFIER_VERSION) {
            return Err(invalid("unsupported version"));
        }
        expect_dash(id, 4).ok_or_else(|| invalid("missing separator"))?;

        let cluster_len =
            hex_field(id, 5, 9).ok_or_else(|| invalid("bad cluster ID length"))? as usize;
        if id.len() != KNOWN_FIELD_SIZE + cluster_len {
            return Err(invalid("length does not match encoded cluster ID length"));
        }
        expect_dash(id, 9).ok_or_else(|| invalid("missing separator"))?;

        let cluster_end = 10 + cluster_len;
        let cluster_id = id
            .get(10..cluster_end)
            .ok_or_else(|| invalid("bad cluster ID"))?;
        expect_dash(id, cluster_end).ok_or_else(|| invalid("missing separator"))?;

        let location_id = hex_field(id, cluster_end + 1, cluster_end + 17)
            .ok_or_else(|| invalid("bad location ID"))? as i64;
        expect_dash(id, cluster_end + 17).ok_or_else(|| invalid("missing separator"))?;

        let uuid_start = cluster_end + 18;
        let object_uuid = id
            .get(uuid_start..uuid_start + UUID_LEN)
            .and_then(|s| Uuid::parse_str(s).ok())
            .ok_or_else(|| invalid("bad object UUID"))?;

        Ok(Self {
            cluster_id: cluster_id.to_string(),
            location_id,
            object_uuid,
        })
    }
}

fn hex_field(id: &str, start: usize, end: usize) -> Option<u64> {
    id.get(start..end)
        .and_then(|field| u64::from_str_radix(field, 16).ok())
}

fn expect_dash(id: &str, at: usize) -> Option<()> {
    (id.as_bytes().get(at) == Some(&b'-')).then_some(())
}
