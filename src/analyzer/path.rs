//! Structural paths into output documents

use serde::{Deserialize, Serialize};
use std::fmt;

use crate::dom::{Element, OutputDocument};

/// Child element indices from the top level of an output document.
///
/// Tag names are not part of the path, so a node can be relocated after a
/// confirmation run renamed it.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct NodePath(Vec<usize>);

impl NodePath {
    /// Path of the document itself
    pub fn root() -> Self {
        Self(Vec::new())
    }

    /// Build a path from indices
    pub fn from_indices(indices: impl Into<Vec<usize>>) -> Self {
        Self(indices.into())
    }

    /// Path of the `index`th child element
    pub fn child(&self, index: usize) -> Self {
        let mut indices = self.0.clone();
        indices.push(index);
        Self(indices)
    }

    /// The indices
    pub fn indices(&self) -> &[usize] {
        &self.0
    }

    /// Number of steps
    pub fn depth(&self) -> usize {
        self.0.len()
    }

    /// Locate the element in a document
    pub fn resolve<'d>(&self, document: &'d OutputDocument) -> Option<&'d Element> {
        document.element_at(&self.0)
    }

    /// Render the path with tag names taken from a document, e.g.
    /// `/html[0]/body[0]/div[2]`. Steps that do not resolve are shown as `*`.
    pub fn describe(&self, document: &OutputDocument) -> String {
        let mut out = String::new();
        let mut current: Option<&Element> = None;
        for (depth, index) in self.0.iter().enumerate() {
            let next = if depth == 0 {
                document.elements().nth(*index)
            } else {
                current.and_then(|e| e.child_elements().nth(*index))
            };
            let name = next.map(|e| e.name.as_str()).unwrap_or("*");
            out.push_str(&format!("/{}[{}]", name, index));
            current = next;
        }
        if out.is_empty() {
            out.push('/');
        }
        out
    }
}

impl fmt::Display for NodePath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.0.is_empty() {
            return f.write_str("/");
        }
        for index in &self.0 {
            write!(f, "/{}", index)?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dom::{OutputParser, XhtmlOutputParser};

    #[test]
    fn test_resolve_and_describe() {
        let doc = XhtmlOutputParser::new()
            .parse("<html><head/><body><p/><div>x</div></body></html>")
            .unwrap();
        let path = NodePath::root().child(0).child(1).child(1);

        assert_eq!(path.resolve(&doc).unwrap().name, "div");
        assert_eq!(path.describe(&doc), "/html[0]/body[1]/div[1]");
        assert_eq!(path.to_string(), "/0/1/1");
        assert_eq!(path.depth(), 3);

        let dangling = path.child(4);
        assert!(dangling.resolve(&doc).is_none());
        assert_eq!(dangling.describe(&doc), "/html[0]/body[1]/div[1]/*[4]");
        assert_eq!(NodePath::root().describe(&doc), "/");
    }
}
