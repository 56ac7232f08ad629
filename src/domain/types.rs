//! Identifiers and small value types shared across layers.

use std::fmt;

use serde::{Deserialize, Serialize};

/// Database identifier of a photo. Ids are assigned in strictly increasing order.
pub type PhotoId = i64;

/// Database identifier of a comment.
pub type CommentId = i64;

/// The paginated feeds a client can walk.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FeedKind {
    Stream,
    Search,
}

impl FeedKind {
    pub fn as_str(self) -> &'static str {
        match self {
            FeedKind::Stream => "stream",
            FeedKind::Search => "search",
        }
    }

    /// Endpoint a client must call to (re)start this feed.
    pub fn first_page_path(self) -> &'static str {
        match self {
            FeedKind::Stream => "/stream",
            FeedKind::Search => "/search",
        }
    }
}

impl fmt::Display for FeedKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Opaque per-client identifier supplied on every request.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct InstallationId(String);

impl InstallationId {
    /// Accepts any non-blank identifier; surrounding whitespace is dropped.
    pub fn parse(raw: &str) -> Option<Self> {
        let trimmed = raw.trim();
        (!trimmed.is_empty()).then(|| Self(trimmed.to_string()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for InstallationId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn installation_rejects_blank_values() {
        assert!(InstallationId::parse("").is_none());
        assert!(InstallationId::parse("   ").is_none());
        assert_eq!(
            InstallationId::parse(" device-1 ").map(|id| id.as_str().to_string()),
            Some("device-1".to_string())
        );
    }
}
