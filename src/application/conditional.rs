//! Validator comparison for conditionally cached responses.

use metrics::counter;
use serde::Serialize;

use crate::application::fingerprint::{FingerprintError, fingerprint};

/// Either the full payload with its validator, or a signal that the client copy is current.
#[derive(Debug, Clone, PartialEq)]
pub enum Conditional<T> {
    Full { payload: T, validator: String },
    NotModified { validator: String },
}

impl<T> Conditional<T> {
    pub fn validator(&self) -> &str {
        match self {
            Conditional::Full { validator, .. } | Conditional::NotModified { validator } => {
                validator
            }
        }
    }

    pub fn is_not_modified(&self) -> bool {
        matches!(self, Conditional::NotModified { .. })
    }
}

/// Hashes `canonical` and compares it with the validator the client presented.
///
/// Validators are opaque strings compared for exact equality.
pub fn respond<T, C>(
    payload: T,
    canonical: &C,
    client_validator: Option<&str>,
) -> Result<Conditional<T>, FingerprintError>
where
    C: Serialize + ?Sized,
{
    let validator = fingerprint(canonical)?;
    if client_validator == Some(validator.as_str()) {
        counter!("photostream_not_modified_total").increment(1);
        return Ok(Conditional::NotModified { validator });
    }
    Ok(Conditional::Full { payload, validator })
}
