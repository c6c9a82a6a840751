//! Schema sources and the per-scan schema cache

use parking_lot::RwLock;
use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::Arc;

use super::model::XsltSchema;
use crate::error::{Error, Result};
use crate::loaders::Loader;
use crate::locations::Location;

/// Provider of inferred schemas, keyed by stylesheet and version
pub trait SchemaSource: Send + Sync {
    /// Fetch the schema of a stylesheet
    fn get_schema(&self, stylesheet_uri: &str, version: u32) -> Result<XsltSchema>;
}

/// Reads persisted schemas from `<dir>/<stylesheet stem>-v<version>.json`
#[derive(Debug, Clone)]
pub struct FileSchemaSource {
    directory: PathBuf,
    loader: Loader,
}

impl FileSchemaSource {
    /// Create a source reading from a directory
    pub fn new(directory: impl Into<PathBuf>) -> Self {
        Self {
            directory: directory.into(),
            loader: Loader::new(),
        }
    }

    /// Set the loader
    pub fn with_loader(mut self, loader: Loader) -> Self {
        self.loader = loader;
        self
    }

    /// File a schema is persisted to
    pub fn schema_path(&self, stylesheet_uri: &str, version: u32) -> PathBuf {
        let last = stylesheet_uri
            .trim_end_matches('/')
            .rsplit(['/', '\\'])
            .next()
            .unwrap_or(stylesheet_uri);
        let stem = last.split('.').next().filter(|s| !s.is_empty()).unwrap_or("stylesheet");
        self.directory.join(format!("{}-v{}.json", stem, version))
    }
}

impl SchemaSource for FileSchemaSource {
    fn get_schema(&self, stylesheet_uri: &str, version: u32) -> Result<XsltSchema> {
        let path = self.schema_path(stylesheet_uri, version);
        let json = self.loader.load(&Location::Path(path.clone()))?;
        let schema = XsltSchema::from_json(&json)?;

        if schema.stylesheet_uri() != stylesheet_uri || schema.version() != version {
            return Err(Error::Schema(format!(
                "'{}' holds the schema of {} v{}, expected {} v{}",
                path.display(),
                schema.stylesheet_uri(),
                schema.version(),
                stylesheet_uri,
                version
            )));
        }
        Ok(schema)
    }
}

/// Caches schemas from a source so each version is loaded once and shared
/// read-only between concurrent scans
pub struct SchemaRepository<S> {
    source: S,
    cache: RwLock<HashMap<(String, u32), Arc<XsltSchema>>>,
}

impl<S: SchemaSource> SchemaRepository<S> {
    /// Create a repository over a source
    pub fn new(source: S) -> Self {
        Self {
            source,
            cache: RwLock::new(HashMap::new()),
        }
    }

    /// Get a schema, loading it on first use
    pub fn get(&self, stylesheet_uri: &str, version: u32) -> Result<Arc<XsltSchema>> {
        let key = (stylesheet_uri.to_string(), version);
        if let Some(schema) = self.cache.read().get(&key) {
            return Ok(Arc::clone(schema));
        }

        let schema = Arc::new(self.source.get_schema(stylesheet_uri, version)?);
        log::debug!("Loaded schema for {} v{}", stylesheet_uri, version);

        let mut cache = self.cache.write();
        Ok(Arc::clone(cache.entry(key).or_insert(schema)))
    }

    /// Number of cached schema versions
    pub fn len(&self) -> usize {
        self.cache.read().len()
    }

    /// Whether nothing is cached yet
    pub fn is_empty(&self) -> bool {
        self.cache.read().is_empty()
    }
}
