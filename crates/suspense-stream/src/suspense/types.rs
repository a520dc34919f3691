use serde::{Deserialize, Serialize};

/// Identifier of one suspended region, matching the `data-suspense-fallback`
/// attribute on its placeholder markup.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(untagged)]
pub enum BoundaryId {
    Numeric(u64),
    Named(String),
}

impl BoundaryId {
    /// Renders the id as a JavaScript expression for an insertion call.
    pub fn to_js_literal(&self) -> String {
        match self {
            Self::Numeric(id) => id.to_string(),
            Self::Named(name) => {
                serde_json::to_string(name).unwrap_or_else(|_| format!("\"{}\"", name))
            }
        }
    }

    /// Placeholder attribute the client looks for, with the value escaped for
    /// a double-quoted attribute.
    pub fn fallback_attribute(&self) -> String {
        let value = self.to_string().replace('&', "&amp;").replace('"', "&quot;");
        format!(r#"data-suspense-fallback="{value}""#)
    }
}

impl std::fmt::Display for BoundaryId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Numeric(id) => write!(f, "{id}"),
            Self::Named(name) => write!(f, "{name}"),
        }
    }
}

impl From<u64> for BoundaryId {
    fn from(id: u64) -> Self {
        Self::Numeric(id)
    }
}

impl From<u32> for BoundaryId {
    fn from(id: u32) -> Self {
        Self::Numeric(u64::from(id))
    }
}

impl From<&str> for BoundaryId {
    fn from(name: &str) -> Self {
        Self::Named(name.to_string())
    }
}

impl From<String> for BoundaryId {
    fn from(name: String) -> Self {
        Self::Named(name)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReadyChunk {
    pub id: BoundaryId,
    pub content: String,
}

impl ReadyChunk {
    pub fn new(id: impl Into<BoundaryId>, content: impl Into<String>) -> Self {
        Self { id: id.into(), content: content.into() }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_numeric_literal_is_bare() {
        assert_eq!(BoundaryId::from(42u64).to_js_literal(), "42");
    }

    #[test]
    fn test_named_literal_is_quoted() {
        assert_eq!(BoundaryId::from("user\"card").to_js_literal(), r#""user\"card""#);
    }

    #[test]
    fn test_fallback_attribute() {
        assert_eq!(BoundaryId::from(3u64).fallback_attribute(), r#"data-suspense-fallback="3""#);
    }

    #[test]
    fn test_fallback_attribute_escapes_named_ids() {
        assert_eq!(
            BoundaryId::from(r#"a"b&c"#).fallback_attribute(),
            r#"data-suspense-fallback="a&quot;b&amp;c""#
        );
        assert_eq!(BoundaryId::from("sidebar").fallback_attribute(), r#"data-suspense-fallback="sidebar""#);
    }
}
