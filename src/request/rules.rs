//! Generation rules
//!
//! Each rule has its own [`RuleId`], independent of the schema object it
//! targets, so the same schema object can be instantiated many times within
//! one plan and every instance stays individually addressable.

use rand::Rng;
use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

use crate::schema::SchemaObjectId;

/// Identity of a generation rule
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RuleId(Uuid);

impl RuleId {
    /// Draw a version-4 ID from the given random source
    pub fn random<R: Rng + ?Sized>(rng: &mut R) -> Self {
        let bytes: [u8; 16] = rng.gen();
        Self(uuid::Builder::from_random_bytes(bytes).into_uuid())
    }

    /// The canonical identity of normalized rules
    pub fn nil() -> Self {
        Self(Uuid::nil())
    }

    /// Whether this is the nil ID
    pub fn is_nil(&self) -> bool {
        self.0.is_nil()
    }

    /// Wrap an existing UUID
    pub fn from_uuid(uuid: Uuid) -> Self {
        Self(uuid)
    }

    /// Fold the ID into 64 bits, used to derive per-rule random seeds
    pub fn fold(&self) -> u64 {
        let (hi, lo) = self.0.as_u64_pair();
        hi ^ lo
    }

    /// First eight hex digits, enough to tell rules apart in markers and logs
    pub fn short(&self) -> String {
        self.0.simple().to_string()[..8].to_string()
    }
}

impl fmt::Display for RuleId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Literal value pinned to a rule for a confirmation run
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RequestedValue(String);

impl RequestedValue {
    /// Wrap a literal value
    pub fn new(value: impl Into<String>) -> Self {
        Self(value.into())
    }

    /// Get the literal value
    pub fn value(&self) -> &str {
        &self.0
    }
}

/// Common interface of all generation rules
pub trait GenerationRule {
    /// Rule identity
    fn id(&self) -> RuleId;

    /// Schema object the rule instantiates
    fn target(&self) -> SchemaObjectId;

    /// Copy with every rule ID reset to nil, for structural comparison
    fn normalize(&self) -> Self
    where
        Self: Sized;
}

/// A rule that produces exactly one scalar value
pub trait ValueRule: GenerationRule {
    /// Pinned value, if any
    fn requested_value(&self) -> Option<&RequestedValue>;

    /// Raw content mode; only raw content rules have one
    fn raw_mode(&self) -> Option<RawContentMode> {
        None
    }
}

/// Whether raw content may contain synthesized markup
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum RawContentMode {
    /// Markup fragments may be synthesized
    #[default]
    Full,
    /// Markup characters are excluded
    Restricted,
}

macro_rules! scalar_rule {
    ($(#[$meta:meta])* $name:ident, $target:ident) => {
        $(#[$meta])*
        #[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
        pub struct $name {
            id: RuleId,
            $target: SchemaObjectId,
            #[serde(default, skip_serializing_if = "Option::is_none")]
            requested_value: Option<RequestedValue>,
        }

        impl $name {
            /// Create a rule without a requested value
            pub fn new(id: RuleId, $target: SchemaObjectId) -> Self {
                Self {
                    id,
                    $target,
                    requested_value: None,
                }
            }

            /// Copy of the rule carrying a requested value
            pub fn with_requested_value(mut self, value: RequestedValue) -> Self {
                self.requested_value = Some(value);
                self
            }

            pub(crate) fn set_requested_value(&mut self, value: RequestedValue) {
                self.requested_value = Some(value);
            }
        }

        impl GenerationRule for $name {
            fn id(&self) -> RuleId {
                self.id
            }

            fn target(&self) -> SchemaObjectId {
                self.$target
            }

            fn normalize(&self) -> Self {
                Self {
                    id: RuleId::nil(),
                    ..self.clone()
                }
            }
        }

        impl ValueRule for $name {
            fn requested_value(&self) -> Option<&RequestedValue> {
                self.requested_value.as_ref()
            }
        }
    };
}

scalar_rule!(
    /// Sets one attribute on the enclosing element
    SetAttributeRule,
    attribute
);

scalar_rule!(
    /// Adds the character data of a DATA element
    AddDataContentRule,
    element_type
);

scalar_rule!(
    /// Supplies the result of an extension function call
    ExtensionFunctionRule,
    function
);

scalar_rule!(
    /// Supplies the value of a stylesheet parameter
    StylesheetParameterRule,
    parameter
);

/// Adds free text or markup inside a MIXED element
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AddRawContentRule {
    id: RuleId,
    element_type: SchemaObjectId,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    requested_value: Option<RequestedValue>,
    mode: RawContentMode,
}

impl AddRawContentRule {
    /// Create a raw content rule
    pub fn new(id: RuleId, element_type: SchemaObjectId, mode: RawContentMode) -> Self {
        Self {
            id,
            element_type,
            requested_value: None,
            mode,
        }
    }

    /// Copy of the rule carrying a requested value
    pub fn with_requested_value(mut self, value: RequestedValue) -> Self {
        self.requested_value = Some(value);
        self
    }

    /// Raw content mode
    pub fn mode(&self) -> RawContentMode {
        self.mode
    }

    pub(crate) fn set_requested_value(&mut self, value: RequestedValue) {
        self.requested_value = Some(value);
    }
}

impl GenerationRule for AddRawContentRule {
    fn id(&self) -> RuleId {
        self.id
    }

    fn target(&self) -> SchemaObjectId {
        self.element_type
    }

    fn normalize(&self) -> Self {
        Self {
            id: RuleId::nil(),
            ..self.clone()
        }
    }
}

impl ValueRule for AddRawContentRule {
    fn requested_value(&self) -> Option<&RequestedValue> {
        self.requested_value.as_ref()
    }

    fn raw_mode(&self) -> Option<RawContentMode> {
        Some(self.mode)
    }
}

/// Content of an element, in document order
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum ContentRule {
    /// Child element
    Element(AddElementRule),
    /// Character data of a DATA element
    Data(AddDataContentRule),
    /// Text or markup of a MIXED element
    Raw(AddRawContentRule),
}

impl ContentRule {
    /// Rule identity
    pub fn id(&self) -> RuleId {
        match self {
            ContentRule::Element(r) => r.id(),
            ContentRule::Data(r) => r.id(),
            ContentRule::Raw(r) => r.id(),
        }
    }

    /// Targeted schema object
    pub fn target(&self) -> SchemaObjectId {
        match self {
            ContentRule::Element(r) => r.target(),
            ContentRule::Data(r) => r.target(),
            ContentRule::Raw(r) => r.target(),
        }
    }

    fn normalize(&self) -> Self {
        match self {
            ContentRule::Element(r) => ContentRule::Element(r.normalize()),
            ContentRule::Data(r) => ContentRule::Data(r.normalize()),
            ContentRule::Raw(r) => ContentRule::Raw(r.normalize()),
        }
    }
}

/// Emits one element for an element reference
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AddElementRule {
    id: RuleId,
    reference: SchemaObjectId,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    attributes: Vec<SetAttributeRule>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    content: Vec<ContentRule>,
}

impl AddElementRule {
    /// Start building an element rule
    pub fn builder(id: RuleId, reference: SchemaObjectId) -> AddElementRuleBuilder {
        AddElementRuleBuilder {
            rule: AddElementRule {
                id,
                reference,
                attributes: Vec::new(),
                content: Vec::new(),
            },
        }
    }

    /// Attribute rules
    pub fn attributes(&self) -> &[SetAttributeRule] {
        &self.attributes
    }

    /// Content rules in document order
    pub fn content(&self) -> &[ContentRule] {
        &self.content
    }

    /// Number of element rules in this subtree, including this one
    pub fn element_count(&self) -> usize {
        1 + self
            .content
            .iter()
            .map(|c| match c {
                ContentRule::Element(e) => e.element_count(),
                _ => 0,
            })
            .sum::<usize>()
    }

    /// Visit every value-bearing rule in traversal order: attributes first,
    /// then content
    pub fn for_each_value_rule<'a>(&'a self, f: &mut dyn FnMut(&'a dyn ValueRule)) {
        for attribute in &self.attributes {
            f(attribute);
        }
        for content in &self.content {
            match content {
                ContentRule::Element(e) => e.for_each_value_rule(f),
                ContentRule::Data(d) => f(d),
                ContentRule::Raw(r) => f(r),
            }
        }
    }

    /// Whether a rule with this ID exists in the subtree
    pub fn contains_rule(&self, rule_id: RuleId) -> bool {
        self.id == rule_id
            || self.attributes.iter().any(|a| a.id() == rule_id)
            || self.content.iter().any(|c| match c {
                ContentRule::Element(e) => e.contains_rule(rule_id),
                other => other.id() == rule_id,
            })
    }

    /// Pin a value on the scalar rule with the given ID. Returns whether the
    /// rule was found. Element rules carry no value and never match.
    pub(crate) fn set_requested_value(&mut self, rule_id: RuleId, value: &RequestedValue) -> bool {
        if let Some(attribute) = self.attributes.iter_mut().find(|a| a.id() == rule_id) {
            attribute.set_requested_value(value.clone());
            return true;
        }
        for content in &mut self.content {
            let found = match content {
                ContentRule::Element(e) => e.set_requested_value(rule_id, value),
                ContentRule::Data(d) if d.id() == rule_id => {
                    d.set_requested_value(value.clone());
                    true
                }
                ContentRule::Raw(r) if r.id() == rule_id => {
                    r.set_requested_value(value.clone());
                    true
                }
                _ => false,
            };
            if found {
                return true;
            }
        }
        false
    }
}

impl GenerationRule for AddElementRule {
    fn id(&self) -> RuleId {
        self.id
    }

    fn target(&self) -> SchemaObjectId {
        self.reference
    }

    fn normalize(&self) -> Self {
        Self {
            id: RuleId::nil(),
            reference: self.reference,
            attributes: self.attributes.iter().map(|a| a.normalize()).collect(),
            content: self.content.iter().map(|c| c.normalize()).collect(),
        }
    }
}

/// Mutable stage of an [`AddElementRule`]; `build` freezes it
#[derive(Debug)]
pub struct AddElementRuleBuilder {
    rule: AddElementRule,
}

impl AddElementRuleBuilder {
    /// Add an attribute rule
    pub fn attribute(mut self, rule: SetAttributeRule) -> Self {
        self.rule.attributes.push(rule);
        self
    }

    /// Append a content rule
    pub fn content(mut self, rule: ContentRule) -> Self {
        self.rule.content.push(rule);
        self
    }

    /// Append several content rules
    pub fn contents(mut self, rules: impl IntoIterator<Item = ContentRule>) -> Self {
        self.rule.content.extend(rules);
        self
    }

    /// Freeze the rule
    pub fn build(self) -> AddElementRule {
        self.rule
    }
}
