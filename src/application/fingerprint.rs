//! Content fingerprints used as validators and change-detection keys.
//!
//! Payloads are serialized to JSON, re-emitted with object keys in sorted order and hashed
//! with SHA-256, so two structurally identical payloads always share a fingerprint no matter
//! how their fields were ordered.

use std::fmt::Write as _;

use serde::Serialize;
use serde_json::Value;
use sha2::{Digest, Sha256};
use thiserror::Error;
use time::OffsetDateTime;

use crate::domain::entities::PhotoRecord;
use crate::domain::types::PhotoId;

#[derive(Debug, Error)]
pub enum FingerprintError {
    #[error("payload could not be serialized: {0}")]
    Serialize(#[from] serde_json::Error),
}

/// Quoted hex SHA-256 of the canonical JSON form of `payload`.
pub fn fingerprint<T: Serialize + ?Sized>(payload: &T) -> Result<String, FingerprintError> {
    let value = serde_json::to_value(payload)?;
    let mut canonical = String::new();
    write_canonical(&value, &mut canonical)?;

    let mut hasher = Sha256::new();
    hasher.update(canonical.as_bytes());
    let digest = hasher.finalize().to_vec();
    Ok(format!("\"{}\"", hex::encode(digest)))
}

fn write_canonical(value: &Value, out: &mut String) -> Result<(), FingerprintError> {
    match value {
        Value::Object(map) => {
            let mut entries: Vec<_> = map.iter().collect();
            entries.sort_by(|(a, _), (b, _)| a.cmp(b));
            out.push('{');
            for (index, (key, inner)) in entries.into_iter().enumerate() {
                if index > 0 {
                    out.push(',');
                }
                out.push_str(&serde_json::to_string(key)?);
                out.push(':');
                write_canonical(inner, out)?;
            }
            out.push('}');
        }
        Value::Array(items) => {
            out.push('[');
            for (index, inner) in items.iter().enumerate() {
                if index > 0 {
                    out.push(',');
                }
                write_canonical(inner, out)?;
            }
            out.push(']');
        }
        scalar => {
            // Scalars have exactly one JSON spelling.
            let _ = write!(out, "{scalar}");
        }
    }
    Ok(())
}

/// Photo stripped of viewer-dependent and frequently changing fields.
#[derive(Debug, Serialize)]
pub struct CanonicalPhoto<'a> {
    pub photo_id: PhotoId,
    pub title: &'a str,
    #[serde(with = "time::serde::rfc3339")]
    pub created_at: OffsetDateTime,
}

impl<'a> From<&'a PhotoRecord> for CanonicalPhoto<'a> {
    fn from(photo: &'a PhotoRecord) -> Self {
        Self {
            photo_id: photo.photo_id,
            title: &photo.title,
            created_at: photo.created_at,
        }
    }
}

pub fn canonical_photos(photos: &[PhotoRecord]) -> Vec<CanonicalPhoto<'_>> {
    photos.iter().map(CanonicalPhoto::from).collect()
}

/// Fingerprint of a stream page: ignores `favorite`, `deleteable` and `comment_count`.
pub fn stream_fingerprint(photos: &[PhotoRecord]) -> Result<String, FingerprintError> {
    fingerprint(&canonical_photos(photos))
}
