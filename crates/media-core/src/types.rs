//! Shared identifier types.

use std::fmt;
use std::sync::Arc;

/// Opaque identifier grouping one AI utterance's text and audio together.
///
/// Supplied by the AI collaborator; the bridge never inspects its contents,
/// only compares and stores it. Cheap to clone.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ResponseId(Arc<str>);

impl ResponseId {
    /// Wrap a collaborator-supplied identifier.
    pub fn new(id: impl AsRef<str>) -> Self {
        Self(Arc::from(id.as_ref()))
    }

    /// The identifier as a string slice.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ResponseId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for ResponseId {
    fn from(id: &str) -> Self {
        Self::new(id)
    }
}

impl From<String> for ResponseId {
    fn from(id: String) -> Self {
        Self::new(id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_response_id_equality_and_display() {
        let a = ResponseId::from("resp_01");
        let b = ResponseId::new("resp_01");
        assert_eq!(a, b);
        assert_eq!(a.to_string(), "resp_01");
        assert_ne!(a, ResponseId::from("resp_02"));
    }
}
