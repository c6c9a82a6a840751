//! Limits and constraints for document generation
//!
//! This module defines the limits that keep generation plans finite for cyclic
//! or deeply nested schemas, and bound the size of documents and transform
//! outputs handled by a scan.

use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};

/// Global limits configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Limits {
    /// Maximum number of element rules in one generation plan. Once reached,
    /// further recursive expansion is suppressed.
    pub max_elements: usize,

    /// Occurrence ceiling used when a reference has no maximum
    pub max_unbounded_occurrences: u32,

    /// Maximum rendered input document size in bytes
    pub max_document_size: usize,

    /// Maximum transform output size in bytes
    pub max_output_size: usize,
}

impl Default for Limits {
    fn default() -> Self {
        Self {
            max_elements: 200,
            max_unbounded_occurrences: 3,
            max_document_size: 10 * 1024 * 1024, // 10 MB
            max_output_size: 50 * 1024 * 1024,   // 50 MB
        }
    }
}

impl Limits {
    /// Create a new Limits with default values
    pub fn new() -> Self {
        Self::default()
    }

    /// Create strict limits (small documents, quick iterations)
    pub fn strict() -> Self {
        Self {
            max_elements: 50,
            max_unbounded_occurrences: 2,
            max_document_size: 1024 * 1024,  // 1 MB
            max_output_size: 5 * 1024 * 1024, // 5 MB
        }
    }

    /// Create permissive limits (large documents, use with caution)
    pub fn permissive() -> Self {
        Self {
            max_elements: 5000,
            max_unbounded_occurrences: 10,
            max_document_size: 100 * 1024 * 1024, // 100 MB
            max_output_size: 500 * 1024 * 1024,   // 500 MB
        }
    }

    /// Set the element ceiling
    pub fn with_max_elements(mut self, max: usize) -> Self {
        self.max_elements = max;
        self
    }

    /// Set the unbounded occurrence ceiling
    pub fn with_max_unbounded_occurrences(mut self, max: u32) -> Self {
        self.max_unbounded_occurrences = max;
        self
    }

    /// Whether the element ceiling allows expanding another element
    pub fn allows_expansion(&self, element_count: usize) -> bool {
        element_count < self.max_elements
    }

    /// Upper occurrence bound for a reference, substituting the ceiling for
    /// unbounded references. Never below `min`.
    pub fn occurrence_upper_bound(&self, min: u32, max: Option<u32>) -> u32 {
        match max {
            Some(max) => max.max(min),
            None => min.max(self.max_unbounded_occurrences),
        }
    }

    /// Check if a rendered document is within limits
    pub fn check_document_size(&self, size: usize) -> Result<()> {
        if size > self.max_document_size {
            Err(Error::LimitExceeded(format!(
                "Document size {} bytes exceeds maximum {} bytes",
                size, self.max_document_size
            )))
        } else {
            Ok(())
        }
    }

    /// Check if a transform output is within limits
    pub fn check_output_size(&self, size: usize) -> Result<()> {
        if size > self.max_output_size {
            Err(Error::LimitExceeded(format!(
                "Output size {} bytes exceeds maximum {} bytes",
                size, self.max_output_size
            )))
        } else {
            Ok(())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_limits() {
        let limits = Limits::default();
        assert_eq!(limits.max_elements, 200);
        assert!(limits.allows_expansion(199));
        assert!(!limits.allows_expansion(200));
    }

    #[test]
    fn test_strict_limits() {
        let limits = Limits::strict();
        assert!(limits.max_elements < Limits::default().max_elements);
        assert!(limits.check_document_size(2 * 1024 * 1024).is_err());
    }

    #[test]
    fn test_permissive_limits() {
        let limits = Limits::permissive();
        assert!(limits.max_elements > Limits::default().max_elements);
        assert!(limits.check_output_size(100 * 1024 * 1024).is_ok());
    }

    #[test]
    fn test_occurrence_upper_bound() {
        let limits = Limits::default().with_max_unbounded_occurrences(4);
        assert_eq!(limits.occurrence_upper_bound(0, Some(2)), 2);
        assert_eq!(limits.occurrence_upper_bound(1, None), 4);
        assert_eq!(limits.occurrence_upper_bound(6, None), 6);
        assert_eq!(limits.occurrence_upper_bound(3, Some(1)), 3);
    }

    #[test]
    fn test_check_output_size() {
        let limits = Limits::default();
        assert!(limits.check_output_size(1024).is_ok());
        assert!(limits.check_output_size(60 * 1024 * 1024).is_err());
    }
}
