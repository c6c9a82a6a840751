//! Analyzer rule engine
//!
//! Each analyzer rule watches one node category of the transformed output.
//! In the detect phase it looks for tracked values in an applicable node and
//! proposes a [`ModificationRequest`]: replace that one value with an attack
//! payload. After the confirmation run, the verify phase relocates the node by
//! its [`NodePath`] and checks whether the payload landed where the rule
//! predicted. Rules share no mutable state; a request carries everything its
//! verification needs.

mod candidate;
mod engine;
mod path;
mod rules;

pub use candidate::{
    Candidate, CandidateState, ModificationRequest, Payload, Verification, VulnerabilityCandidate,
};
pub use engine::{AnalyzerConfig, AnalyzerEngine};
pub use path::NodePath;
pub use rules::{
    AttributeNameRule, DisableOutputEscapingRule, ElementNameRule, EventHandlerRule,
    ScriptBlockRule, StyleAttributeRule, StyleBlockRule, StylesheetLinkRule, UrlAttributeRule,
};

use crate::dom::{Element, OutputDocument};
use crate::schema::XsltSchema;
use crate::values::{TaintMarker, ValueDescriptor, ValueLedger};

/// Node categories rules dispatch on
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum NodeCategory {
    /// Element
    Element,
    /// Attribute
    Attribute,
    /// Text node
    Text,
    /// Script or style body, or CDATA
    Data,
}

/// Borrowed view of one output node
#[derive(Debug, Clone, Copy)]
pub enum NodeRef<'a> {
    /// An element
    Element {
        /// Path of the element
        path: &'a NodePath,
        /// The element
        element: &'a Element,
    },
    /// An attribute of an element
    Attribute {
        /// Path of the owning element
        path: &'a NodePath,
        /// Owning element
        element: &'a Element,
        /// Attribute name
        name: &'a str,
        /// Attribute value
        value: &'a str,
    },
    /// A text child
    Text {
        /// Path of the parent element
        path: &'a NodePath,
        /// Parent element
        parent: &'a Element,
        /// The text
        text: &'a str,
    },
    /// A data child
    Data {
        /// Path of the parent element
        path: &'a NodePath,
        /// Parent element
        parent: &'a Element,
        /// The data
        text: &'a str,
    },
}

impl<'a> NodeRef<'a> {
    /// Category of the node
    pub fn category(&self) -> NodeCategory {
        match self {
            NodeRef::Element { .. } => NodeCategory::Element,
            NodeRef::Attribute { .. } => NodeCategory::Attribute,
            NodeRef::Text { .. } => NodeCategory::Text,
            NodeRef::Data { .. } => NodeCategory::Data,
        }
    }

    /// Path of the node's element
    pub fn path(&self) -> &'a NodePath {
        match *self {
            NodeRef::Element { path, .. }
            | NodeRef::Attribute { path, .. }
            | NodeRef::Text { path, .. }
            | NodeRef::Data { path, .. } => path,
        }
    }

    /// The element, owning element or parent element
    pub fn element(&self) -> &'a Element {
        match *self {
            NodeRef::Element { element, .. } | NodeRef::Attribute { element, .. } => element,
            NodeRef::Text { parent, .. } | NodeRef::Data { parent, .. } => parent,
        }
    }

    /// Attribute name, for attribute nodes
    pub fn attribute_name(&self) -> Option<&'a str> {
        match *self {
            NodeRef::Attribute { name, .. } => Some(name),
            _ => None,
        }
    }

    /// Short output excerpt for reports
    pub fn sample(&self, max_length: usize) -> String {
        let full = match self {
            NodeRef::Element { element, .. } => start_tag(element),
            NodeRef::Attribute { name, value, .. } => format!("{}=\"{}\"", name, value),
            NodeRef::Text { text, .. } | NodeRef::Data { text, .. } => text.to_string(),
        };
        truncate(&full, max_length)
    }
}

pub(crate) fn start_tag(element: &Element) -> String {
    let mut tag = format!("<{}", element.name);
    for (name, value) in &element.attributes {
        tag.push_str(&format!(" {}=\"{}\"", name, value));
    }
    tag.push('>');
    tag
}

pub(crate) fn truncate(text: &str, max_length: usize) -> String {
    if text.chars().count() <= max_length {
        return text.to_string();
    }
    let mut out: String = text.chars().take(max_length).collect();
    out.push_str("...");
    out
}

/// Read-only inputs of the detect phase
#[derive(Debug, Clone, Copy)]
pub struct DetectContext<'a> {
    /// Schema of the plan
    pub schema: &'a XsltSchema,
    /// Ledger of the plan execution
    pub ledger: &'a ValueLedger,
    /// Taint marker of the scan
    pub marker: &'a TaintMarker,
    /// Analyzer configuration
    pub config: &'a AnalyzerConfig,
}

impl<'a> DetectContext<'a> {
    /// Tracked values occurring in `text` whose schema object attacker input
    /// can reach
    pub fn tracked_in(&self, text: &str) -> Vec<&'a ValueDescriptor> {
        let schema = self.schema;
        self.ledger
            .tracked()
            .filter(|d| d.marker.as_deref().map_or(false, |m| text.contains(m)))
            .filter(|d| {
                schema
                    .object(d.schema_object)
                    .map(|object| object.is_user_modifiable())
                    .unwrap_or(false)
            })
            .collect()
    }

    /// Marker a rule injects for one value: scan prefix, rule code and the
    /// generation rule's short ID
    pub fn injected_marker(&self, analyzer_rule: &str, descriptor: &ValueDescriptor) -> String {
        let code: String = analyzer_rule
            .chars()
            .filter(|c| c.is_ascii_alphanumeric())
            .collect::<String>()
            .to_ascii_lowercase();
        format!("{}{}{}", self.marker.prefix(), code, descriptor.rule.short())
    }
}

/// An independent detector over one node category
pub trait AnalyzerRule: Send + Sync {
    /// Stable rule ID such as `A.1`
    fn id(&self) -> &'static str;

    /// One line description
    fn description(&self) -> &'static str;

    /// Node category the rule inspects
    fn category(&self) -> NodeCategory;

    /// Whether the node's context is the one the rule attacks
    fn is_applicable(&self, node: &NodeRef<'_>, config: &AnalyzerConfig) -> bool;

    /// Text of the node searched for tracked values
    fn probe<'n>(&self, node: &NodeRef<'n>) -> Option<&'n str>;

    /// Attack value for one injected marker
    fn replacement(&self, marker: &str, config: &AnalyzerConfig) -> String;

    /// Identifying string the verify phase looks for
    fn verification_marker(&self, marker: &str, _config: &AnalyzerConfig) -> String {
        marker.to_string()
    }

    /// Propose one modification per tracked value found in the node
    fn detect(&self, node: &NodeRef<'_>, context: &DetectContext<'_>) -> Vec<ModificationRequest> {
        let text = match self.probe(node) {
            Some(text) => text,
            None => return Vec::new(),
        };
        let max_sample = context.config.sample_length;

        context
            .tracked_in(text)
            .into_iter()
            .map(|descriptor| {
                let marker = context.injected_marker(self.id(), descriptor);
                ModificationRequest {
                    analyzer_rule: self.id().to_string(),
                    generation_rule: descriptor.rule,
                    payload: Payload {
                        schema_object: descriptor.schema_object,
                        path: node.path().clone(),
                        attribute: node.attribute_name().map(str::to_string),
                        marker: self.verification_marker(&marker, context.config),
                        replacement: self.replacement(&marker, context.config),
                        input_sample: descriptor.value.clone(),
                        output_sample: node.sample(max_sample),
                        baseline_attributes: node.element().attributes.keys().cloned().collect(),
                    },
                }
            })
            .collect()
    }

    /// Check the confirmation output
    fn verify(&self, request: &ModificationRequest, output: &OutputDocument) -> Verification;
}
