//! Schema model
//!
//! The schema describes which input documents a stylesheet accepts: element
//! types with their content models and attributes, the root elements, and the
//! extension functions and stylesheet parameters the stylesheet declares. It is
//! inferred elsewhere, loaded once per scan and never mutated; every component
//! downstream refers to schema objects by [`SchemaObjectId`] and resolves them
//! through the schema's cached index.

mod ids;
mod model;
mod repository;
mod types;

pub use ids::SchemaObjectId;
pub use model::{SchemaBuilder, SchemaObject, XsltSchema};
pub use repository::{FileSchemaSource, SchemaRepository, SchemaSource};
pub use types::{
    Arrangement, Attribute, ContentType, DataConstraint, DataType, ElementReference, ElementType,
    ExtensionFunction, Occurrence, SequenceType, StylesheetParameter,
};
