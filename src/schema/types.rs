//! Schema object types
//!
//! Element types, element references, attributes, extension functions and
//! stylesheet parameters. Every object carries its own [`SchemaObjectId`];
//! element references point at their element type by ID only, so a schema is a
//! plain tree of values even when its content models are cyclic.

use serde::{Deserialize, Serialize};
use std::fmt;

use super::ids::SchemaObjectId;
use crate::namespaces::QName;

/// Content category of an element type
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum ContentType {
    /// No content at all
    #[default]
    Empty,
    /// Character data only
    Data,
    /// Child elements only
    Element,
    /// Child elements interleaved with character data
    Mixed,
}

impl ContentType {
    /// Get the content type as a string
    pub fn as_str(&self) -> &'static str {
        match self {
            ContentType::Empty => "EMPTY",
            ContentType::Data => "DATA",
            ContentType::Element => "ELEMENT",
            ContentType::Mixed => "MIXED",
        }
    }
}

impl fmt::Display for ContentType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Scalar data type of attribute values and data content
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum DataType {
    /// Arbitrary text
    #[default]
    String,
    /// xs:boolean
    Boolean,
    /// xs:integer
    Integer,
    /// Any other type, generated like a string
    Other,
}

impl DataType {
    /// Name of the matching XML Schema type
    pub fn xsd_name(&self) -> &'static str {
        match self {
            DataType::String => "xs:string",
            DataType::Boolean => "xs:boolean",
            DataType::Integer => "xs:integer",
            DataType::Other => "xs:anyAtomicType",
        }
    }
}

/// Compositor of an element-only content model
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Arrangement {
    /// Children in declared order
    #[default]
    Sequence,
    /// Children in any order
    All,
    /// Exactly one of the children
    Choice,
}

impl fmt::Display for Arrangement {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Sequence => write!(f, "sequence"),
            Self::All => write!(f, "all"),
            Self::Choice => write!(f, "choice"),
        }
    }
}

/// Constraints on a scalar value
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct DataConstraint {
    /// Data type
    pub data_type: DataType,
    /// Maximum length in characters (strings only)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub max_length: Option<usize>,
    /// Inclusive lower bound (integers only)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub min_value: Option<i64>,
    /// Inclusive upper bound (integers only)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub max_value: Option<i64>,
    /// Discrete values, either closed (fixed) or seed values (interesting)
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub discrete_values: Vec<String>,
    /// When true, `discrete_values` is the complete set of valid values
    pub fixed_values: bool,
}

impl DataConstraint {
    /// Unconstrained value of the given type
    pub fn new(data_type: DataType) -> Self {
        Self {
            data_type,
            ..Default::default()
        }
    }

    /// Unconstrained string
    pub fn string() -> Self {
        Self::new(DataType::String)
    }

    /// Boolean
    pub fn boolean() -> Self {
        Self::new(DataType::Boolean)
    }

    /// Unconstrained integer
    pub fn integer() -> Self {
        Self::new(DataType::Integer)
    }

    /// Set the maximum length
    pub fn with_max_length(mut self, max_length: usize) -> Self {
        self.max_length = Some(max_length);
        self
    }

    /// Set the inclusive integer range
    pub fn with_range(mut self, min: Option<i64>, max: Option<i64>) -> Self {
        self.min_value = min;
        self.max_value = max;
        self
    }

    /// Restrict the value to a closed set
    pub fn with_fixed_values<I, S>(mut self, values: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.discrete_values = values.into_iter().map(Into::into).collect();
        self.fixed_values = true;
        self
    }

    /// Bias generation towards seed values without restricting it
    pub fn with_interesting_values<I, S>(mut self, values: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.discrete_values = values.into_iter().map(Into::into).collect();
        self.fixed_values = false;
        self
    }

    /// Whether the value set is closed
    pub fn has_fixed_set(&self) -> bool {
        self.fixed_values && !self.discrete_values.is_empty()
    }

    /// Whether seed values exist but do not restrict the value
    pub fn has_interesting_set(&self) -> bool {
        !self.fixed_values && !self.discrete_values.is_empty()
    }

    /// Check the hard constraints: parseable as the data type, within bounds and
    /// length, and a member of the fixed set if there is one
    pub fn accepts(&self, value: &str) -> bool {
        match self.data_type {
            DataType::String | DataType::Other => {
                if let Some(max) = self.max_length {
                    if value.chars().count() > max {
                        return false;
                    }
                }
                !self.has_fixed_set() || self.discrete_values.iter().any(|v| v == value)
            }
            DataType::Boolean => {
                let parsed = parse_boolean(value);
                match parsed {
                    None => false,
                    Some(b) if self.has_fixed_set() => self
                        .discrete_values
                        .iter()
                        .any(|v| parse_boolean(v) == Some(b)),
                    Some(_) => true,
                }
            }
            DataType::Integer => {
                let Ok(n) = value.trim().parse::<i64>() else {
                    return false;
                };
                if self.min_value.is_some_and(|min| n < min) {
                    return false;
                }
                if self.max_value.is_some_and(|max| n > max) {
                    return false;
                }
                !self.has_fixed_set()
                    || self
                        .discrete_values
                        .iter()
                        .any(|v| v.trim().parse::<i64>().ok() == Some(n))
            }
        }
    }
}

fn parse_boolean(value: &str) -> Option<bool> {
    match value.trim() {
        "true" | "1" => Some(true),
        "false" | "0" => Some(false),
        _ => None,
    }
}

/// Reference from a content model (or the schema root) to an element type
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ElementReference {
    /// Object ID of the reference itself
    pub id: SchemaObjectId,
    /// Element name written into documents
    pub name: String,
    /// Target element type
    pub element_type: SchemaObjectId,
    /// Minimum number of occurrences
    #[serde(default)]
    pub min_occurs: u32,
    /// Maximum number of occurrences (None = unbounded)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_occurs: Option<u32>,
}

impl ElementReference {
    /// Create a reference occurring exactly once. A persisted reference
    /// without bounds reads back as optional and unbounded instead.
    pub fn exactly_once(name: impl Into<String>, element_type: SchemaObjectId) -> Self {
        Self {
            id: SchemaObjectId::new(),
            name: name.into(),
            element_type,
            min_occurs: 1,
            max_occurs: Some(1),
        }
    }

    /// Set the occurrence bounds
    pub fn with_occurs(mut self, min: u32, max: Option<u32>) -> Self {
        self.min_occurs = min;
        self.max_occurs = max;
        self
    }
}

/// Attribute declaration of an element type
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Attribute {
    /// Object ID
    pub id: SchemaObjectId,
    /// Attribute name
    pub name: String,
    /// Value constraints
    #[serde(default)]
    pub constraint: DataConstraint,
    /// Whether the attribute may be omitted
    #[serde(default)]
    pub optional: bool,
    /// Whether attacker-controlled input can reach this attribute
    #[serde(default = "default_true")]
    pub user_modifiable: bool,
}

fn default_true() -> bool {
    true
}

impl Attribute {
    /// Create a mandatory attribute
    pub fn new(name: impl Into<String>, constraint: DataConstraint) -> Self {
        Self {
            id: SchemaObjectId::new(),
            name: name.into(),
            constraint,
            optional: false,
            user_modifiable: true,
        }
    }

    /// Mark the attribute as optional
    pub fn optional(mut self) -> Self {
        self.optional = true;
        self
    }

    /// Set whether attacker input can reach the attribute
    pub fn with_user_modifiable(mut self, user_modifiable: bool) -> Self {
        self.user_modifiable = user_modifiable;
        self
    }
}

/// Element type: content model, data constraints and attributes
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ElementType {
    /// Object ID
    pub id: SchemaObjectId,
    /// Descriptive name (not written into documents)
    pub name: String,
    /// Content category
    pub content_type: ContentType,
    /// Data constraints, meaningful for DATA content
    #[serde(default)]
    pub data: DataConstraint,
    /// Compositor, meaningful for ELEMENT and MIXED content
    #[serde(default)]
    pub arrangement: Arrangement,
    /// Child element references in declared order
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub elements: Vec<ElementReference>,
    /// Attribute declarations
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub attributes: Vec<Attribute>,
    /// Whether attacker-controlled input can reach this element, if known
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub user_modifiable: Option<bool>,
}

impl ElementType {
    fn with_content(name: impl Into<String>, content_type: ContentType) -> Self {
        Self {
            id: SchemaObjectId::new(),
            name: name.into(),
            content_type,
            data: DataConstraint::default(),
            arrangement: Arrangement::default(),
            elements: Vec::new(),
            attributes: Vec::new(),
            user_modifiable: None,
        }
    }

    /// Element type without content
    pub fn empty(name: impl Into<String>) -> Self {
        Self::with_content(name, ContentType::Empty)
    }

    /// Element type with character data content
    pub fn data(name: impl Into<String>, constraint: DataConstraint) -> Self {
        let mut element_type = Self::with_content(name, ContentType::Data);
        element_type.data = constraint;
        element_type
    }

    /// Element type with child elements only
    pub fn element(name: impl Into<String>, arrangement: Arrangement) -> Self {
        let mut element_type = Self::with_content(name, ContentType::Element);
        element_type.arrangement = arrangement;
        element_type
    }

    /// Element type with mixed content
    pub fn mixed(name: impl Into<String>) -> Self {
        Self::with_content(name, ContentType::Mixed)
    }

    /// Add a child element reference
    pub fn with_child(mut self, reference: ElementReference) -> Self {
        self.elements.push(reference);
        self
    }

    /// Add an attribute declaration
    pub fn with_attribute(mut self, attribute: Attribute) -> Self {
        self.attributes.push(attribute);
        self
    }

    /// Set whether attacker input can reach the element
    pub fn with_user_modifiable(mut self, user_modifiable: bool) -> Self {
        self.user_modifiable = Some(user_modifiable);
        self
    }

    /// Create a reference to this element type occurring exactly once
    pub fn reference(&self, name: impl Into<String>) -> ElementReference {
        ElementReference::exactly_once(name, self.id)
    }
}

/// Occurrence indicator of a sequence type
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum Occurrence {
    /// Exactly one item
    #[default]
    ExactlyOne,
    /// `?`
    ZeroOrOne,
    /// `*`
    ZeroOrMore,
    /// `+`
    OneOrMore,
}

impl Occurrence {
    /// The XPath occurrence indicator
    pub fn indicator(&self) -> &'static str {
        match self {
            Occurrence::ExactlyOne => "",
            Occurrence::ZeroOrOne => "?",
            Occurrence::ZeroOrMore => "*",
            Occurrence::OneOrMore => "+",
        }
    }
}

/// Item type plus occurrence, e.g. `xs:string+`
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub struct SequenceType {
    /// Item type
    pub item_type: DataType,
    /// Occurrence indicator
    #[serde(default)]
    pub occurrence: Occurrence,
}

impl SequenceType {
    /// Create a sequence type
    pub fn new(item_type: DataType, occurrence: Occurrence) -> Self {
        Self {
            item_type,
            occurrence,
        }
    }

    /// Exactly one item of the given type
    pub fn one(item_type: DataType) -> Self {
        Self::new(item_type, Occurrence::ExactlyOne)
    }

    /// Constraint for a single generated item
    pub fn item_constraint(&self) -> DataConstraint {
        DataConstraint::new(self.item_type)
    }
}

impl fmt::Display for SequenceType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}{}", self.item_type.xsd_name(), self.occurrence.indicator())
    }
}

/// Extension function the stylesheet calls; its result is attacker-suppliable
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExtensionFunction {
    /// Object ID
    pub id: SchemaObjectId,
    /// Qualified function name
    pub name: QName,
    /// Argument types
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub arguments: Vec<SequenceType>,
    /// Result type
    pub result_type: SequenceType,
}

impl ExtensionFunction {
    /// Create an extension function declaration
    pub fn new(name: QName, result_type: SequenceType) -> Self {
        Self {
            id: SchemaObjectId::new(),
            name,
            arguments: Vec::new(),
            result_type,
        }
    }

    /// Add an argument type
    pub fn with_argument(mut self, argument: SequenceType) -> Self {
        self.arguments.push(argument);
        self
    }
}

/// Global `xsl:param` of the stylesheet
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StylesheetParameter {
    /// Object ID
    pub id: SchemaObjectId,
    /// Qualified parameter name
    pub name: QName,
    /// Declared type
    pub param_type: SequenceType,
}

impl StylesheetParameter {
    /// Create a stylesheet parameter declaration
    pub fn new(name: QName, param_type: SequenceType) -> Self {
        Self {
            id: SchemaObjectId::new(),
            name,
            param_type,
        }
    }
}
