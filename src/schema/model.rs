//! The schema root object and its ID index

use once_cell::sync::OnceCell;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

use super::ids::SchemaObjectId;
use super::types::{
    Attribute, ContentType, DataConstraint, ElementReference, ElementType, ExtensionFunction,
    StylesheetParameter,
};
use crate::error::{Error, Result};
use crate::names::is_valid_qname;

/// Position of an object inside the schema's vectors
#[derive(Debug, Clone, Copy)]
enum Slot {
    ElementType(usize),
    Attribute(usize, usize),
    ChildReference(usize, usize),
    RootReference(usize),
    ExtensionFunction(usize),
    StylesheetParameter(usize),
}

/// Borrowed view of any schema object
#[derive(Debug, Clone, Copy)]
pub enum SchemaObject<'a> {
    /// Element type
    ElementType(&'a ElementType),
    /// Attribute together with its owning element type
    Attribute {
        /// Owning element type
        owner: &'a ElementType,
        /// The attribute
        attribute: &'a Attribute,
    },
    /// Element reference (root or child)
    ElementReference(&'a ElementReference),
    /// Extension function
    ExtensionFunction(&'a ExtensionFunction),
    /// Stylesheet parameter
    StylesheetParameter(&'a StylesheetParameter),
}

impl<'a> SchemaObject<'a> {
    /// Kind name used in error messages
    pub fn kind(&self) -> &'static str {
        match self {
            SchemaObject::ElementType(_) => "element type",
            SchemaObject::Attribute { .. } => "attribute",
            SchemaObject::ElementReference(_) => "element reference",
            SchemaObject::ExtensionFunction(_) => "extension function",
            SchemaObject::StylesheetParameter(_) => "stylesheet parameter",
        }
    }

    /// Human readable name of the object
    pub fn name(&self) -> String {
        match self {
            SchemaObject::ElementType(t) => t.name.clone(),
            SchemaObject::Attribute { owner, attribute } => {
                format!("{}/@{}", owner.name, attribute.name)
            }
            SchemaObject::ElementReference(r) => r.name.clone(),
            SchemaObject::ExtensionFunction(f) => format!("{}()", f.name),
            SchemaObject::StylesheetParameter(p) => format!("${}", p.name),
        }
    }

    /// Constraint for a single scalar value bound to this object, if the object
    /// carries values at all
    pub fn value_constraint(&self) -> Option<DataConstraint> {
        match self {
            SchemaObject::ElementType(t) => match t.content_type {
                ContentType::Data => Some(t.data.clone()),
                ContentType::Mixed => Some(DataConstraint::string()),
                ContentType::Empty | ContentType::Element => None,
            },
            SchemaObject::Attribute { attribute, .. } => Some(attribute.constraint.clone()),
            SchemaObject::ElementReference(_) => None,
            SchemaObject::ExtensionFunction(f) => Some(f.result_type.item_constraint()),
            SchemaObject::StylesheetParameter(p) => Some(p.param_type.item_constraint()),
        }
    }

    /// Whether attacker input can reach the object. Unknown counts as reachable.
    pub fn is_user_modifiable(&self) -> bool {
        match self {
            SchemaObject::ElementType(t) => t.user_modifiable.unwrap_or(true),
            SchemaObject::Attribute { attribute, .. } => attribute.user_modifiable,
            _ => true,
        }
    }
}

/// Immutable schema of the documents a stylesheet accepts
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct XsltSchema {
    stylesheet_uri: String,
    version: u32,
    element_types: Vec<ElementType>,
    root_elements: Vec<ElementReference>,
    #[serde(default)]
    extension_functions: Vec<ExtensionFunction>,
    #[serde(default)]
    stylesheet_parameters: Vec<StylesheetParameter>,
    #[serde(skip)]
    index: OnceCell<HashMap<SchemaObjectId, Slot>>,
}

impl PartialEq for XsltSchema {
    fn eq(&self, other: &Self) -> bool {
        self.stylesheet_uri == other.stylesheet_uri
            && self.version == other.version
            && self.element_types == other.element_types
            && self.root_elements == other.root_elements
            && self.extension_functions == other.extension_functions
            && self.stylesheet_parameters == other.stylesheet_parameters
    }
}

impl XsltSchema {
    /// Start building a schema for a stylesheet
    pub fn builder(stylesheet_uri: impl Into<String>, version: u32) -> SchemaBuilder {
        SchemaBuilder {
            schema: XsltSchema {
                stylesheet_uri: stylesheet_uri.into(),
                version,
                element_types: Vec::new(),
                root_elements: Vec::new(),
                extension_functions: Vec::new(),
                stylesheet_parameters: Vec::new(),
                index: OnceCell::new(),
            },
        }
    }

    /// Load the persisted form and check it
    pub fn from_json(json: &str) -> Result<Self> {
        let schema: XsltSchema = serde_json::from_str(json)?;
        schema.check()?;
        Ok(schema)
    }

    /// Write the persisted form
    pub fn to_json(&self) -> Result<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }

    /// Stylesheet the schema was inferred from
    pub fn stylesheet_uri(&self) -> &str {
        &self.stylesheet_uri
    }

    /// Schema version
    pub fn version(&self) -> u32 {
        self.version
    }

    /// All element types
    pub fn element_types(&self) -> &[ElementType] {
        &self.element_types
    }

    /// Possible document roots
    pub fn root_elements(&self) -> &[ElementReference] {
        &self.root_elements
    }

    /// Declared extension functions
    pub fn extension_functions(&self) -> &[ExtensionFunction] {
        &self.extension_functions
    }

    /// Declared stylesheet parameters
    pub fn stylesheet_parameters(&self) -> &[StylesheetParameter] {
        &self.stylesheet_parameters
    }

    fn build_index(&self) -> Result<HashMap<SchemaObjectId, Slot>> {
        let mut index = HashMap::new();
        let mut insert = |id: SchemaObjectId, slot: Slot| -> Result<()> {
            if index.insert(id, slot).is_some() {
                return Err(Error::Schema(format!("Duplicate schema object ID {}", id)));
            }
            Ok(())
        };

        for (i, element_type) in self.element_types.iter().enumerate() {
            insert(element_type.id, Slot::ElementType(i))?;
            for (j, attribute) in element_type.attributes.iter().enumerate() {
                insert(attribute.id, Slot::Attribute(i, j))?;
            }
            for (j, reference) in element_type.elements.iter().enumerate() {
                insert(reference.id, Slot::ChildReference(i, j))?;
            }
        }
        for (i, reference) in self.root_elements.iter().enumerate() {
            insert(reference.id, Slot::RootReference(i))?;
        }
        for (i, function) in self.extension_functions.iter().enumerate() {
            insert(function.id, Slot::ExtensionFunction(i))?;
        }
        for (i, parameter) in self.stylesheet_parameters.iter().enumerate() {
            insert(parameter.id, Slot::StylesheetParameter(i))?;
        }

        Ok(index)
    }

    fn index(&self) -> Result<&HashMap<SchemaObjectId, Slot>> {
        self.index.get_or_try_init(|| self.build_index())
    }

    /// Check ID uniqueness, reference targets and names
    pub fn check(&self) -> Result<()> {
        self.index()?;

        let references = self
            .root_elements
            .iter()
            .chain(self.element_types.iter().flat_map(|t| t.elements.iter()));
        for reference in references {
            if !is_valid_qname(&reference.name) {
                return Err(Error::Schema(format!(
                    "Element reference {} has invalid name '{}'",
                    reference.id, reference.name
                )));
            }
            self.referenced_type(reference)?;
        }

        for element_type in &self.element_types {
            for attribute in &element_type.attributes {
                if !is_valid_qname(&attribute.name) {
                    return Err(Error::Schema(format!(
                        "Attribute {} of '{}' has invalid name '{}'",
                        attribute.id, element_type.name, attribute.name
                    )));
                }
            }
        }

        Ok(())
    }

    /// Resolve any schema object by ID
    pub fn object(&self, id: SchemaObjectId) -> Result<SchemaObject<'_>> {
        let slot = *self
            .index()?
            .get(&id)
            .ok_or(Error::UnknownSchemaObject(id))?;

        Ok(match slot {
            Slot::ElementType(i) => SchemaObject::ElementType(&self.element_types[i]),
            Slot::Attribute(i, j) => {
                let owner = &self.element_types[i];
                SchemaObject::Attribute {
                    owner,
                    attribute: &owner.attributes[j],
                }
            }
            Slot::ChildReference(i, j) => {
                SchemaObject::ElementReference(&self.element_types[i].elements[j])
            }
            Slot::RootReference(i) => SchemaObject::ElementReference(&self.root_elements[i]),
            Slot::ExtensionFunction(i) => {
                SchemaObject::ExtensionFunction(&self.extension_functions[i])
            }
            Slot::StylesheetParameter(i) => {
                SchemaObject::StylesheetParameter(&self.stylesheet_parameters[i])
            }
        })
    }

    /// Resolve an element type
    pub fn element_type(&self, id: SchemaObjectId) -> Result<&ElementType> {
        match self.object(id)? {
            SchemaObject::ElementType(t) => Ok(t),
            other => Err(kind_error(id, "element type", &other)),
        }
    }

    /// Resolve an element reference
    pub fn element_reference(&self, id: SchemaObjectId) -> Result<&ElementReference> {
        match self.object(id)? {
            SchemaObject::ElementReference(r) => Ok(r),
            other => Err(kind_error(id, "element reference", &other)),
        }
    }

    /// Resolve an attribute
    pub fn attribute(&self, id: SchemaObjectId) -> Result<&Attribute> {
        match self.object(id)? {
            SchemaObject::Attribute { attribute, .. } => Ok(attribute),
            other => Err(kind_error(id, "attribute", &other)),
        }
    }

    /// Resolve an extension function
    pub fn extension_function(&self, id: SchemaObjectId) -> Result<&ExtensionFunction> {
        match self.object(id)? {
            SchemaObject::ExtensionFunction(f) => Ok(f),
            other => Err(kind_error(id, "extension function", &other)),
        }
    }

    /// Resolve a stylesheet parameter
    pub fn stylesheet_parameter(&self, id: SchemaObjectId) -> Result<&StylesheetParameter> {
        match self.object(id)? {
            SchemaObject::StylesheetParameter(p) => Ok(p),
            other => Err(kind_error(id, "stylesheet parameter", &other)),
        }
    }

    /// Follow a reference to its element type
    pub fn referenced_type(&self, reference: &ElementReference) -> Result<&ElementType> {
        self.element_type(reference.element_type)
    }
}

fn kind_error(id: SchemaObjectId, expected: &'static str, found: &SchemaObject<'_>) -> Error {
    Error::ObjectKind {
        id,
        expected,
        found: found.kind(),
    }
}

/// Builder collecting schema objects before the schema is checked and frozen
#[derive(Debug)]
pub struct SchemaBuilder {
    schema: XsltSchema,
}

impl SchemaBuilder {
    /// Add an element type
    pub fn element_type(mut self, element_type: ElementType) -> Self {
        self.schema.element_types.push(element_type);
        self
    }

    /// Add a root element reference
    pub fn root(mut self, reference: ElementReference) -> Self {
        self.schema.root_elements.push(reference);
        self
    }

    /// Add an extension function
    pub fn extension_function(mut self, function: ExtensionFunction) -> Self {
        self.schema.extension_functions.push(function);
        self
    }

    /// Add a stylesheet parameter
    pub fn stylesheet_parameter(mut self, parameter: StylesheetParameter) -> Self {
        self.schema.stylesheet_parameters.push(parameter);
        self
    }

    /// Check and freeze the schema
    pub fn build(self) -> Result<XsltSchema> {
        if self.schema.root_elements.is_empty() {
            return Err(Error::Schema(format!(
                "Schema for '{}' has no root elements",
                self.schema.stylesheet_uri
            )));
        }
        self.schema.check()?;
        Ok(self.schema)
    }
}
