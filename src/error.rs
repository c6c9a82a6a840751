//! Error types for xsltxss
//!
//! This module defines all error types used throughout the library.
//! Three families matter to callers:
//!
//! - wiring errors (unknown IDs, wrong object kinds, illegal state) which abort a scan,
//! - collaborator failures (transform, timeout, output parsing) which refute a single
//!   candidate and are otherwise survivable,
//! - resource limits.
//!
//! Constraint violations on requested values are never errors; the value generator
//! silently falls back to synthesis.

use std::fmt;
use std::time::Duration;
use thiserror::Error;

use crate::schema::SchemaObjectId;
use crate::request::RuleId;

/// Result type alias using xsltxss Error
pub type Result<T> = std::result::Result<T, Error>;

/// Main error type for xsltxss operations
#[derive(Error, Debug)]
pub enum Error {
    /// A schema object ID that the current schema does not contain
    #[error("unknown schema object: {0}")]
    UnknownSchemaObject(SchemaObjectId),

    /// A generation rule ID that the current request does not contain
    #[error("unknown generation rule: {0}")]
    UnknownRule(RuleId),

    /// An analyzer rule ID that is not registered
    #[error("unknown analyzer rule: {0}")]
    UnknownAnalyzerRule(String),

    /// A schema object was found but is of the wrong kind for the caller
    #[error("schema object {id} is a {found}, expected {expected}")]
    ObjectKind {
        /// Object that was looked up
        id: SchemaObjectId,
        /// Kind the caller needed
        expected: &'static str,
        /// Kind actually stored under the ID
        found: &'static str,
    },

    /// Programming-contract violation with context
    #[error("illegal state: {0}")]
    IllegalState(#[from] StateError),

    /// Stylesheet or processor failure reported by the transform engine
    #[error("transform failed: {0}")]
    Transform(#[from] TransformError),

    /// The transform engine did not answer in time
    #[error("transform timed out after {0:?}")]
    Timeout(Duration),

    /// Transformed output could not be parsed into a node tree
    #[error("output parse error: {0}")]
    OutputParse(String),

    /// Invalid schema content (dangling references, bad names)
    #[error("schema error: {0}")]
    Schema(String),

    /// Value error (invalid value for a type)
    #[error("value error: {0}")]
    Value(String),

    /// Resource loading error
    #[error("resource error: {0}")]
    Resource(String),

    /// Name error (invalid XML name)
    #[error("name error: {0}")]
    Name(String),

    /// Limit exceeded error
    #[error("limit exceeded: {0}")]
    LimitExceeded(String),

    /// I/O error
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// XML writing or parsing error
    #[error("XML error: {0}")]
    Xml(String),

    /// Persisted form (de)serialization error
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// URL parsing error
    #[error("URL error: {0}")]
    Url(#[from] url::ParseError),

    /// Generic error
    #[error("{0}")]
    Other(String),
}

impl Error {
    /// Whether this error comes from an external collaborator and should only
    /// refute the candidate being confirmed
    pub fn is_collaborator_failure(&self) -> bool {
        matches!(
            self,
            Error::Transform(_) | Error::Timeout(_) | Error::OutputParse(_) | Error::LimitExceeded(_)
        )
    }
}

impl From<quick_xml::Error> for Error {
    fn from(err: quick_xml::Error) -> Self {
        Error::Xml(err.to_string())
    }
}

/// Contract violation detected while wiring schema, plan and analyzers together
#[derive(Debug, Clone)]
pub struct StateError {
    /// Error message
    pub message: String,
    /// Generation rule involved, if any
    pub rule_id: Option<RuleId>,
    /// Schema object involved, if any
    pub schema_object: Option<SchemaObjectId>,
    /// Document or output excerpt
    pub sample: Option<String>,
}

impl StateError {
    /// Create a new state error
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            rule_id: None,
            schema_object: None,
            sample: None,
        }
    }

    /// Set the generation rule
    pub fn with_rule(mut self, rule_id: RuleId) -> Self {
        self.rule_id = Some(rule_id);
        self
    }

    /// Set the schema object
    pub fn with_schema_object(mut self, id: SchemaObjectId) -> Self {
        self.schema_object = Some(id);
        self
    }

    /// Set the sample
    pub fn with_sample(mut self, sample: impl Into<String>) -> Self {
        self.sample = Some(sample.into());
        self
    }
}

impl fmt::Display for StateError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.message)?;

        if let Some(ref rule) = self.rule_id {
            write!(f, "\n\nRule: {}", rule)?;
        }

        if let Some(ref object) = self.schema_object {
            write!(f, "\n\nSchema object: {}", object)?;
        }

        if let Some(ref sample) = self.sample {
            write!(f, "\n\nSample:\n{}", sample)?;
        }

        Ok(())
    }
}

impl std::error::Error for StateError {}

/// Failure reported by the XSLT processor
#[derive(Debug, Clone)]
pub struct TransformError {
    /// Error message
    pub message: String,
    /// Stylesheet that was being applied
    pub stylesheet: Option<String>,
    /// Input document that triggered the failure
    pub input: Option<String>,
}

impl TransformError {
    /// Create a new transform error
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            stylesheet: None,
            input: None,
        }
    }

    /// Set the stylesheet
    pub fn with_stylesheet(mut self, stylesheet: impl Into<String>) -> Self {
        self.stylesheet = Some(stylesheet.into());
        self
    }

    /// Set the input document
    pub fn with_input(mut self, input: impl Into<String>) -> Self {
        self.input = Some(input.into());
        self
    }
}

impl fmt::Display for TransformError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.message)?;

        if let Some(ref stylesheet) = self.stylesheet {
            write!(f, "\n\nStylesheet: {}", stylesheet)?;
        }

        if let Some(ref input) = self.input {
            write!(f, "\n\nInput:\n{}", input)?;
        }

        Ok(())
    }
}

impl std::error::Error for TransformError {}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_state_error_display() {
        let err = StateError::new("reference target missing")
            .with_rule(RuleId::nil())
            .with_schema_object(SchemaObjectId::nil())
            .with_sample("<a/>");

        let msg = format!("{}", err);
        assert!(msg.contains("reference target missing"));
        assert!(msg.contains("Rule:"));
        assert!(msg.contains("Schema object:"));
        assert!(msg.contains("Sample:"));
    }

    #[test]
    fn test_transform_error_display() {
        let err = TransformError::new("XTDE0640: circular definition")
            .with_stylesheet("file:///tmp/page.xsl")
            .with_input("<root/>");

        let msg = format!("{}", err);
        assert!(msg.contains("XTDE0640"));
        assert!(msg.contains("Stylesheet:"));
        assert!(msg.contains("Input:"));
    }

    #[test]
    fn test_collaborator_failures() {
        assert!(Error::Timeout(Duration::from_secs(1)).is_collaborator_failure());
        assert!(Error::from(TransformError::new("boom")).is_collaborator_failure());
        assert!(!Error::UnknownRule(RuleId::nil()).is_collaborator_failure());
    }
}
