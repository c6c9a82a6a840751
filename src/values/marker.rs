//! Taint markers and prefix selection

use rand::Rng;
use rand::SeedableRng;
use rand_chacha::ChaCha20Rng;

use crate::error::{Error, Result};
use crate::loaders::Loader;
use crate::locations::Location;
use crate::names::is_marker_safe;

const PREFIX_FIRST: &[u8] = b"abcdefghijklmnopqrstuvwxyz";
const PREFIX_REST: &[u8] = b"abcdefghijklmnopqrstuvwxyz0123456789";

/// Literal prefix embedded in synthesized values, plus the minimum length a
/// value needs to be attributable
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct TaintMarker {
    prefix: String,
    min_length: usize,
}

impl TaintMarker {
    /// Create a marker. The prefix must be usable as an element name.
    pub fn new(prefix: impl Into<String>, min_length: usize) -> Result<Self> {
        let prefix = prefix.into();
        if !is_marker_safe(&prefix) {
            return Err(Error::Value(format!(
                "Marker prefix '{}' must be lowercase ASCII letters and digits",
                prefix
            )));
        }
        let min_length = min_length.max(prefix.len());
        Ok(Self { prefix, min_length })
    }

    /// The prefix
    pub fn prefix(&self) -> &str {
        &self.prefix
    }

    /// Minimum length of a tracked value
    pub fn min_length(&self) -> usize {
        self.min_length
    }

    /// Extract the tracked token embedded in a value: the first run of marker
    /// characters starting with the prefix, if it is long enough
    pub fn token_in<'v>(&self, value: &'v str) -> Option<&'v str> {
        let mut search = 0;
        while let Some(offset) = value[search..].find(&self.prefix) {
            let start = search + offset;
            let end = value[start..]
                .find(|c: char| !(c.is_ascii_lowercase() || c.is_ascii_digit()))
                .map(|n| start + n)
                .unwrap_or(value.len());
            if end - start >= self.min_length {
                return Some(&value[start..end]);
            }
            search = end.max(start + 1);
        }
        None
    }
}

/// Chooses the taint marker for one stylesheet
pub trait PrefixSelector: Send + Sync {
    /// Pick a prefix that does not occur in the stylesheet's literal text
    fn select_prefix(&self, stylesheet_uri: &str) -> Result<TaintMarker>;
}

/// Draws random prefixes until one does not occur in the stylesheet text
#[derive(Debug, Clone)]
pub struct LiteralScanPrefixSelector {
    loader: Loader,
    seed: u64,
    prefix_length: usize,
    min_suffix_length: usize,
    max_attempts: usize,
}

impl LiteralScanPrefixSelector {
    /// Create a selector with a seed for reproducible prefixes
    pub fn new(seed: u64) -> Self {
        Self {
            loader: Loader::new(),
            seed,
            prefix_length: 5,
            min_suffix_length: 3,
            max_attempts: 1000,
        }
    }

    /// Set the loader used to read the stylesheet
    pub fn with_loader(mut self, loader: Loader) -> Self {
        self.loader = loader;
        self
    }

    /// Set the prefix length
    pub fn with_prefix_length(mut self, length: usize) -> Self {
        self.prefix_length = length.max(1);
        self
    }

    /// Pick a prefix against already loaded stylesheet text
    pub fn select_for_text(&self, stylesheet_text: &str) -> Result<TaintMarker> {
        let haystack = stylesheet_text.to_ascii_lowercase();
        let mut rng = ChaCha20Rng::seed_from_u64(self.seed);

        for _ in 0..self.max_attempts {
            let prefix = random_prefix(&mut rng, self.prefix_length);
            if !haystack.contains(&prefix) {
                return TaintMarker::new(prefix, self.prefix_length + self.min_suffix_length);
            }
        }
        Err(Error::Value(format!(
            "No collision-free prefix of length {} after {} attempts",
            self.prefix_length, self.max_attempts
        )))
    }
}

impl PrefixSelector for LiteralScanPrefixSelector {
    fn select_prefix(&self, stylesheet_uri: &str) -> Result<TaintMarker> {
        let location = match Location::parse(stylesheet_uri)? {
            Location::Inline(_) => {
                return Err(Error::Resource(format!(
                    "Stylesheet '{}' is neither an existing path nor a URL",
                    stylesheet_uri
                )))
            }
            location => location,
        };
        let text = self.loader.load(&location)?;
        let marker = self.select_for_text(&text)?;
        log::debug!("Selected marker prefix '{}' for {}", marker.prefix(), stylesheet_uri);
        Ok(marker)
    }
}

fn random_prefix<R: Rng + ?Sized>(rng: &mut R, length: usize) -> String {
    let mut prefix = String::with_capacity(length);
    prefix.push(PREFIX_FIRST[rng.gen_range(0..PREFIX_FIRST.len())] as char);
    for _ in 1..length {
        prefix.push(PREFIX_REST[rng.gen_range(0..PREFIX_REST.len())] as char);
    }
    prefix
}

/// Random marker characters, used for value suffixes
pub(crate) fn random_suffix<R: Rng + ?Sized>(rng: &mut R, length: usize) -> String {
    (0..length)
        .map(|_| PREFIX_REST[rng.gen_range(0..PREFIX_REST.len())] as char)
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_marker_rejects_unsafe_prefix() {
        assert!(TaintMarker::new("xq", 4).is_ok());
        assert!(TaintMarker::new("Xq", 4).is_err());
        assert!(TaintMarker::new("1x", 4).is_err());
        assert!(TaintMarker::new("", 4).is_err());
        assert_eq!(TaintMarker::new("abcdef", 2).unwrap().min_length(), 6);
    }

    #[test]
    fn test_token_in() {
        let marker = TaintMarker::new("zq", 5).unwrap();
        assert_eq!(marker.token_in("zq12345"), Some("zq12345"));
        assert_eq!(marker.token_in("<b>zqab9x</b>"), Some("zqab9x"));
        assert_eq!(marker.token_in("zq1 zqabcd"), Some("zqabcd"));
        assert_eq!(marker.token_in("zq1"), None);
        assert_eq!(marker.token_in("nothing"), None);
    }

    #[test]
    fn test_prefix_avoids_stylesheet_literals() {
        let selector = LiteralScanPrefixSelector::new(4).with_prefix_length(1);
        // Every letter but one occurs in the text
        let text = "ABCDEFGHIJKLMNOPQRSTUVWXY";
        let marker = selector.select_for_text(text).unwrap();
        assert_eq!(marker.prefix(), "z");
    }

    #[test]
    fn test_prefix_exhaustion() {
        let selector = LiteralScanPrefixSelector::new(4).with_prefix_length(1);
        let text = "abcdefghijklmnopqrstuvwxyz";
        assert!(matches!(selector.select_for_text(text), Err(Error::Value(_))));
    }

    #[test]
    fn test_select_prefix_from_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("page.xsl");
        std::fs::write(&path, "<xsl:stylesheet/>").unwrap();

        let selector = LiteralScanPrefixSelector::new(9);
        let marker = selector.select_prefix(path.to_str().unwrap()).unwrap();
        assert_eq!(marker.prefix().len(), 5);
        assert_eq!(marker.min_length(), 8);
        assert_eq!(marker, selector.select_prefix(path.to_str().unwrap()).unwrap());
    }

    #[test]
    fn test_select_prefix_requires_readable_stylesheet() {
        let selector = LiteralScanPrefixSelector::new(9);
        assert!(matches!(
            selector.select_prefix("does-not-exist/page.xsl"),
            Err(Error::Resource(_))
        ));
        assert!(matches!(selector.select_prefix("page.xsl"), Err(Error::Resource(_))));

        let dir = tempfile::tempdir().unwrap();
        let missing = dir.path().join("missing.xsl");
        assert!(selector.select_prefix(missing.to_str().unwrap()).is_err());
    }
}
