use rustc_hash::FxHashMap;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ErrorMetadata {
    pub code: String,
    pub details: Option<FxHashMap<String, String>>,
    pub source: Option<String>,
}

/// Terminal failure of a streamed response.
///
/// Cloneable so a failed out-of-band channel can hand the same error to every
/// consumer that polls it afterwards.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum StreamError {
    Boundary(String, Option<ErrorMetadata>),
    Transport(String, Option<ErrorMetadata>),
    Disconnected(String, Option<ErrorMetadata>),
    State(String, Option<ErrorMetadata>),
    Internal(String, Option<ErrorMetadata>),
}

impl std::fmt::Display for StreamError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Boundary(msg, _) => write!(f, "Boundary failed: {msg}"),
            Self::Transport(msg, _) => write!(f, "Transport error: {msg}"),
            Self::Disconnected(msg, _) => write!(f, "Client disconnected: {msg}"),
            Self::State(msg, _) => write!(f, "State error: {msg}"),
            Self::Internal(msg, _) => write!(f, "{msg}"),
        }
    }
}

impl std::error::Error for StreamError {}

impl StreamError {
    pub fn message(&self) -> &str {
        match self {
            Self::Boundary(msg, _)
            | Self::Transport(msg, _)
            | Self::Disconnected(msg, _)
            | Self::State(msg, _)
            | Self::Internal(msg, _) => msg,
        }
    }

    pub fn code(&self) -> &'static str {
        match self {
            Self::Boundary(_, _) => "BOUNDARY_FAILURE",
            Self::Transport(_, _) => "TRANSPORT_FAILURE",
            Self::Disconnected(_, _) => "CLIENT_DISCONNECTED",
            Self::State(_, _) => "STATE_ERROR",
            Self::Internal(_, _) => "INTERNAL",
        }
    }

    pub fn metadata(&self) -> Option<&ErrorMetadata> {
        match self {
            Self::Boundary(_, meta)
            | Self::Transport(_, meta)
            | Self::Disconnected(_, meta)
            | Self::State(_, meta)
            | Self::Internal(_, meta) => meta.as_ref(),
        }
    }

    fn metadata_mut(&mut self) -> &mut Option<ErrorMetadata> {
        match self {
            Self::Boundary(_, meta)
            | Self::Transport(_, meta)
            | Self::Disconnected(_, meta)
            | Self::State(_, meta)
            | Self::Internal(_, meta) => meta,
        }
    }

    pub fn boundary(message: impl Into<String>) -> Self {
        Self::Boundary(message.into(), None)
    }

    pub fn transport(message: impl Into<String>) -> Self {
        Self::Transport(message.into(), None)
    }

    pub fn disconnected(message: impl Into<String>) -> Self {
        Self::Disconnected(message.into(), None)
    }

    pub fn state(message: impl Into<String>) -> Self {
        Self::State(message.into(), None)
    }

    pub fn internal(message: impl Into<String>) -> Self {
        Self::Internal(message.into(), None)
    }

    pub fn is_boundary_failure(&self) -> bool {
        matches!(self, Self::Boundary(_, _))
    }

    pub fn is_transport_failure(&self) -> bool {
        matches!(self, Self::Transport(_, _) | Self::Disconnected(_, _))
    }

    pub fn with_source(mut self, source: impl std::fmt::Display) -> Self {
        let code = self.code().to_string();
        let metadata = self.metadata_mut();
        let meta = metadata.get_or_insert_with(|| ErrorMetadata {
            code,
            details: None,
            source: None,
        });
        meta.source = Some(source.to_string());
        self
    }

    pub fn with_property(mut self, key: &str, value: &str) -> Self {
        self.set_property(key, value);
        self
    }

    pub fn set_property(&mut self, key: &str, value: &str) {
        let code = self.code().to_string();
        let metadata = self.metadata_mut();
        let meta = metadata.get_or_insert_with(|| ErrorMetadata {
            code,
            details: None,
            source: None,
        });

        meta.details
            .get_or_insert_with(FxHashMap::default)
            .insert(key.to_string(), value.to_string());
    }

    pub fn get_property(&self, key: &str) -> Option<&str> {
        self.metadata()
            .and_then(|meta| meta.details.as_ref())
            .and_then(|details| details.get(key))
            .map(String::as_str)
    }
}

impl From<std::io::Error> for StreamError {
    fn from(error: std::io::Error) -> Self {
        let message = error.to_string();
        let meta = Some(ErrorMetadata {
            code: "IO_ERROR".to_string(),
            details: None,
            source: Some("std::io::Error".to_string()),
        });

        match error.kind() {
            std::io::ErrorKind::BrokenPipe
            | std::io::ErrorKind::ConnectionReset
            | std::io::ErrorKind::ConnectionAborted => Self::Disconnected(message, meta),
            _ => Self::Transport(message, meta),
        }
    }
}

impl From<axum::Error> for StreamError {
    fn from(error: axum::Error) -> Self {
        Self::Transport(
            error.to_string(),
            Some(ErrorMetadata {
                code: "BODY_ERROR".to_string(),
                details: None,
                source: Some("axum::Error".to_string()),
            }),
        )
    }
}

impl From<String> for StreamError {
    fn from(error: String) -> Self {
        Self::Internal(error, None)
    }
}

impl From<&str> for StreamError {
    fn from(error: &str) -> Self {
        Self::Internal(error.to_string(), None)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_display_and_code() {
        let error = StreamError::boundary("render exploded");
        assert_eq!(error.to_string(), "Boundary failed: render exploded");
        assert_eq!(error.code(), "BOUNDARY_FAILURE");
        assert_eq!(error.message(), "render exploded");
        assert!(error.is_boundary_failure());
        assert!(!error.is_transport_failure());
    }

    #[test]
    fn test_properties_roundtrip() {
        let error = StreamError::boundary("failed").with_property("boundary_id", "7");
        assert_eq!(error.get_property("boundary_id"), Some("7"));
        assert_eq!(error.get_property("missing"), None);
        assert_eq!(error.metadata().map(|m| m.code.as_str()), Some("BOUNDARY_FAILURE"));
    }

    #[test]
    fn test_io_broken_pipe_is_disconnect() {
        let io = std::io::Error::new(std::io::ErrorKind::BrokenPipe, "pipe closed");
        let error: StreamError = io.into();
        assert!(matches!(error, StreamError::Disconnected(_, _)));
        assert!(error.is_transport_failure());

        let io = std::io::Error::other("boom");
        let error: StreamError = io.into();
        assert!(matches!(error, StreamError::Transport(_, _)));
    }

    #[test]
    fn test_clone_preserves_metadata() {
        let error = StreamError::state("dropped").with_source("coordinator");
        let cloned = error.clone();
        assert_eq!(error, cloned);
        assert_eq!(cloned.metadata().and_then(|m| m.source.as_deref()), Some("coordinator"));
    }
}
