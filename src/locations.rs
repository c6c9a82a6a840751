//! Stylesheet and schema location resolution
//!
//! A scan is anchored to one stylesheet. Its location is used to load the
//! stylesheet text (for prefix selection), to key cached schemas, and is handed
//! to the transform engine unchanged.

use crate::error::Result;
use std::fmt;
use std::path::PathBuf;
use url::Url;

/// Resource location - can be a URL, file path, or string identifier
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Location {
    /// File system path
    Path(PathBuf),
    /// URL (http, https, ftp, etc.)
    Url(Url),
    /// In-memory resource: the string is the content itself
    Inline(String),
}

impl Location {
    /// Create a location from a string (auto-detect type)
    pub fn parse(s: &str) -> Result<Self> {
        if let Ok(url) = Url::parse(s) {
            if url.scheme() == "file" {
                if let Ok(path) = url.to_file_path() {
                    return Ok(Location::Path(path));
                }
            } else if url.scheme().len() > 1 {
                // Single-letter schemes are Windows drive letters
                return Ok(Location::Url(url));
            }
        }

        let path = PathBuf::from(s);
        if path.exists() || s.starts_with('/') || s.starts_with('.') {
            return Ok(Location::Path(path));
        }

        Ok(Location::Inline(s.to_string()))
    }

    /// Get the location as a URI-like string, used as the stylesheet identifier
    pub fn as_uri(&self) -> String {
        match self {
            Location::Path(p) => match Url::from_file_path(p) {
                Ok(url) => url.to_string(),
                Err(()) => p.to_string_lossy().to_string(),
            },
            Location::Url(u) => u.to_string(),
            Location::Inline(_) => "inline:stylesheet".to_string(),
        }
    }

    /// Check if this is a remote location (URL)
    pub fn is_remote(&self) -> bool {
        matches!(self, Location::Url(_))
    }

    /// Check if this is a local file
    pub fn is_file(&self) -> bool {
        matches!(self, Location::Path(_))
    }
}

impl fmt::Display for Location {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.as_uri())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_location_from_url() {
        let loc = Location::parse("http://example.com/page.xsl").unwrap();
        assert!(matches!(loc, Location::Url(_)));
        assert!(loc.is_remote());
    }

    #[test]
    fn test_location_from_path() {
        let loc = Location::parse("/tmp/page.xsl").unwrap();
        assert!(matches!(loc, Location::Path(_)));
        assert!(loc.is_file());
        assert_eq!(loc.as_uri(), "file:///tmp/page.xsl");
    }

    #[test]
    fn test_location_from_file_url() {
        let loc = Location::parse("file:///tmp/page.xsl").unwrap();
        assert_eq!(loc, Location::Path(PathBuf::from("/tmp/page.xsl")));
    }

    #[test]
    fn test_inline_location() {
        let loc = Location::parse("<xsl:stylesheet/>").unwrap();
        assert!(matches!(loc, Location::Inline(_)));
        assert_eq!(loc.as_uri(), "inline:stylesheet");
    }
}
