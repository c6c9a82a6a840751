//! XML namespace handling
//!
//! Extension functions and stylesheet parameters are identified by qualified
//! names. This module provides the QName type and its Clark-notation form
//! (`{namespace}local`), which is how names are handed to the transform engine.

use serde::{Deserialize, Serialize};
use std::fmt;

use crate::error::{Error, Result};
use crate::names::is_valid_ncname;

/// Qualified name (QName) - combination of namespace and local name
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct QName {
    /// Namespace URI (None for no namespace)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub namespace: Option<String>,
    /// Local name
    pub local_name: String,
}

impl QName {
    /// Create a QName without a namespace
    pub fn local(local_name: impl Into<String>) -> Self {
        Self {
            namespace: None,
            local_name: local_name.into(),
        }
    }

    /// Create a QName with a namespace
    pub fn namespaced(namespace: impl Into<String>, local_name: impl Into<String>) -> Self {
        Self {
            namespace: Some(namespace.into()),
            local_name: local_name.into(),
        }
    }

    /// Parse Clark notation: `{uri}local` or a bare local name
    pub fn from_clark(s: &str) -> Result<Self> {
        let qname = match s.strip_prefix('{') {
            Some(rest) => {
                let (ns, local) = rest
                    .split_once('}')
                    .ok_or_else(|| Error::Name(format!("Unterminated namespace in '{}'", s)))?;
                if ns.is_empty() {
                    Self::local(local)
                } else {
                    Self::namespaced(ns, local)
                }
            }
            None => Self::local(s),
        };

        if !is_valid_ncname(&qname.local_name) {
            return Err(Error::Name(format!("Invalid local name in '{}'", s)));
        }
        Ok(qname)
    }

    /// Get the fully qualified name in Clark notation
    pub fn to_clark(&self) -> String {
        match &self.namespace {
            Some(ns) => format!("{{{}}}{}", ns, self.local_name),
            None => self.local_name.clone(),
        }
    }
}

impl fmt::Display for QName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.to_clark())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_qname_creation() {
        let qname = QName::local("element");
        assert_eq!(qname.namespace, None);
        assert_eq!(qname.local_name, "element");

        let qname = QName::namespaced("http://example.com/ext", "lookup");
        assert_eq!(qname.namespace.as_deref(), Some("http://example.com/ext"));
        assert_eq!(qname.to_string(), "{http://example.com/ext}lookup");
    }

    #[test]
    fn test_from_clark() {
        let qname = QName::from_clark("{urn:ext}title").unwrap();
        assert_eq!(qname, QName::namespaced("urn:ext", "title"));

        assert_eq!(QName::from_clark("lang").unwrap(), QName::local("lang"));
        assert_eq!(QName::from_clark("{}lang").unwrap(), QName::local("lang"));
        assert!(QName::from_clark("{urn:ext").is_err());
        assert!(QName::from_clark("{urn:ext}1x").is_err());
    }
}
