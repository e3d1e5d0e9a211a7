//! Tags, storage server identities and throughput quotas.
//!
//! Quotas are expressed in cost units per second, where cost is the
//! bytes-proportional scalar the storage engine attributes to each read or
//! write. A tag's quota row lives in the durable quota key range; the codec
//! for that row is here as well.

use std::fmt;

use bytes::Bytes;
use uuid::Uuid;

/// Prefix of the durable quota key range. A tag's quota row has the key
/// `TAG_QUOTA_PREFIX ++ tag`.
pub const TAG_QUOTA_PREFIX: &[u8] = b"\xff/tagQuota/";

/// Length in bytes of an encoded [`TagQuota`] value.
pub const ENCODED_QUOTA_LEN: usize = 32;

/// A tenant-scoped request class. Opaque bytes; keys every table in the
/// controller as well as the durable quota range.
#[derive(Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Tag(Bytes);

impl Tag {
    /// Create a tag from raw bytes.
    pub fn new(bytes: impl Into<Bytes>) -> Self {
        Self(bytes.into())
    }

    /// The raw bytes of this tag.
    #[must_use]
    pub fn as_bytes(&self) -> &[u8] {
        &self.0
    }
}

impl From<&str> for Tag {
    fn from(s: &str) -> Self {
        Self(Bytes::copy_from_slice(s.as_bytes()))
    }
}

impl fmt::Display for Tag {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for byte in &self.0 {
            if byte.is_ascii_graphic() {
                write!(f, "{}", char::from(*byte))?;
            } else {
                write!(f, "\\x{byte:02x}")?;
            }
        }
        Ok(())
    }
}

impl fmt::Debug for Tag {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Tag({self})")
    }
}

/// Unique identity of a storage server, keying the telemetry tables.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ServerId(Uuid);

impl ServerId {
    /// Wrap an existing identity.
    #[must_use]
    pub fn new(id: Uuid) -> Self {
        Self(id)
    }

    /// Mint a fresh random identity.
    #[must_use]
    pub fn random() -> Self {
        Self(Uuid::new_v4())
    }
}

impl fmt::Display for ServerId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

/// Per-tag throughput quota, all fields in cost units per second.
///
/// `total_*` is the cluster-wide ceiling on the tag's cost rate; `reserved_*`
/// is the floor below which the tag must not be throttled. A zero field means
/// "no such quota". The record as a whole is retained while the row exists.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct TagQuota {
    /// Ceiling on the tag's cluster-wide read cost rate.
    pub total_read: f64,
    /// Ceiling on the tag's cluster-wide write cost rate.
    pub total_write: f64,
    /// Floor below which read throughput is never throttled.
    pub reserved_read: f64,
    /// Floor below which write throughput is never throttled.
    pub reserved_write: f64,
}

/// Errors produced when decoding a [`TagQuota`] row.
#[derive(thiserror::Error, Debug, Clone, Copy, PartialEq, Eq)]
pub enum DecodeError {
    /// The value had the wrong length.
    #[error("quota value must be {ENCODED_QUOTA_LEN} bytes, got {got}")]
    Length {
        /// Observed value length.
        got: usize,
    },
    /// A field was negative, NaN or infinite.
    #[error("quota field {field} is not a finite non-negative number")]
    NotFiniteNonNegative {
        /// Name of the offending field.
        field: &'static str,
    },
    /// A reserved quota exceeded its total.
    #[error("reserved {field} quota exceeds total")]
    ReservedAboveTotal {
        /// Operation side of the offending pair.
        field: &'static str,
    },
}

impl TagQuota {
    /// Check the field invariants: all four fields finite and non-negative,
    /// reserves no greater than totals.
    ///
    /// # Errors
    ///
    /// Returns the first violated invariant.
    pub fn validate(&self) -> Result<(), DecodeError> {
        for (field, value) in [
            ("total_read", self.total_read),
            ("total_write", self.total_write),
            ("reserved_read", self.reserved_read),
            ("reserved_write", self.reserved_write),
        ] {
            if !value.is_finite() || value < 0.0 {
                return Err(DecodeError::NotFiniteNonNegative { field });
            }
        }
        if self.reserved_read > self.total_read {
            return Err(DecodeError::ReservedAboveTotal { field: "read" });
        }
        if self.reserved_write > self.total_write {
            return Err(DecodeError::ReservedAboveTotal { field: "write" });
        }
        Ok(())
    }

    /// Encode this quota as a fixed-width row value: four little-endian
    /// doubles in field order.
    #[must_use]
    pub fn encode(&self) -> [u8; ENCODED_QUOTA_LEN] {
        let mut out = [0_u8; ENCODED_QUOTA_LEN];
        out[0..8].copy_from_slice(&self.total_read.to_le_bytes());
        out[8..16].copy_from_slice(&self.total_write.to_le_bytes());
        out[16..24].copy_from_slice(&self.reserved_read.to_le_bytes());
        out[24..32].copy_from_slice(&self.reserved_write.to_le_bytes());
        out
    }

    /// Decode a row value produced by [`TagQuota::encode`].
    ///
    /// # Errors
    ///
    /// Returns an error if the value has the wrong length or violates the
    /// field invariants.
    pub fn decode(value: &[u8]) -> Result<Self, DecodeError> {
        if value.len() != ENCODED_QUOTA_LEN {
            return Err(DecodeError::Length { got: value.len() });
        }
        let mut fields = [0.0_f64; 4];
        for (i, field) in fields.iter_mut().enumerate() {
            let mut buf = [0_u8; 8];
            buf.copy_from_slice(&value[i * 8..(i + 1) * 8]);
            *field = f64::from_le_bytes(buf);
        }
        let quota = Self {
            total_read: fields[0],
            total_write: fields[1],
            reserved_read: fields[2],
            reserved_write: fields[3],
        };
        quota.validate()?;
        Ok(quota)
    }
}

/// The durable key of a tag's quota row.
#[must_use]
pub fn quota_key(tag: &Tag) -> Vec<u8> {
    let mut key = Vec::with_capacity(TAG_QUOTA_PREFIX.len() + tag.as_bytes().len());
    key.extend_from_slice(TAG_QUOTA_PREFIX);
    key.extend_from_slice(tag.as_bytes());
    key
}

/// Recover the tag from a quota row key, if the key is in the quota range.
#[must_use]
pub fn tag_from_quota_key(key: &[u8]) -> Option<Tag> {
    key.strip_prefix(TAG_QUOTA_PREFIX)
        .map(|tag| Tag(Bytes::copy_from_slice(tag)))
}
