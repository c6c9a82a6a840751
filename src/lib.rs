//! # xsltxss
//!
//! Schema-driven discovery of cross-site scripting in XSLT stylesheets.
//!
//! A scan repeats one loop: generate a synthetic input document from the
//! schema inferred for a stylesheet, embed a collision-free marker in every
//! value, run the stylesheet, and look for markers that reached a dangerous
//! position in the output. Each such detection is confirmed by a second run
//! in which exactly one value is replaced with an attack payload.
//!
//! ## Features
//!
//! - Constraint-satisfying plan generation from an immutable, versioned schema
//! - Taint-tracked value synthesis with a per-plan provenance ledger
//! - Nine analyzer rules covering attribute and element names, unescaped
//!   text, event handlers, script and style blocks, stylesheet links and URL
//!   attributes
//! - Reproducible runs: plans, values and rule IDs derive from a seed and
//!   round-trip through JSON
//! - Async orchestration with bounded concurrent confirmations and transform
//!   timeouts
//!
//! ## Example
//!
//! ```rust,no_run
//! use std::sync::Arc;
//! use xsltxss::error::TransformError;
//! use xsltxss::schema::{Attribute, DataConstraint, ElementType, XsltSchema};
//! use xsltxss::scanner::{Scanner, Transformer};
//! use xsltxss::{ScanConfig, TaintMarker};
//!
//! # async fn run() -> xsltxss::Result<()> {
//! let item = ElementType::empty("item")
//!     .with_attribute(Attribute::new("name", DataConstraint::string()));
//! let schema = XsltSchema::builder("item.xsl", 1)
//!     .root(item.reference("item"))
//!     .element_type(item)
//!     .build()?;
//!
//! let processor: Arc<dyn Transformer> = Arc::new(|xml: &str, _uri: &str| -> Result<String, TransformError> {
//!     Ok(xml.to_string())
//! });
//! let scanner = Scanner::new(ScanConfig::default(), Arc::new(schema), processor);
//! let summary = scanner.scan(&TaintMarker::new("zqx", 6)?).await?;
//! println!("{} confirmed", summary.confirmed);
//! # Ok(())
//! # }
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]

// Foundation
pub mod error;
pub mod limits;

// Utilities
pub mod namespaces;
pub mod names;
pub mod locations;
pub mod loaders;

// Schema and generation
pub mod schema;
pub mod request;
pub mod values;
pub mod documents;

// Analysis
pub mod dom;
pub mod analyzer;

// Orchestration
pub mod config;
pub mod scanner;

// Re-exports for convenience
pub use analyzer::{AnalyzerConfig, AnalyzerEngine, ModificationRequest, VulnerabilityCandidate};
pub use config::ScanConfig;
pub use documents::{DocumentRenderer, RenderedDocument};
pub use error::{Error, Result};
pub use limits::Limits;
pub use request::{GeneratorConfig, RawContentMode, Request, RequestGenerator, RuleId};
pub use scanner::{ScanSummary, Scanner};
pub use schema::{SchemaObjectId, XsltSchema};
pub use values::{TaintMarker, ValueConfig, ValueGenerator, ValueLedger};

/// Version of the xsltxss library
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
