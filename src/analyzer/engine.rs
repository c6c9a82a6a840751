//! Rule registry and output traversal

use std::collections::HashSet;

use serde::{Deserialize, Serialize};

use super::candidate::{ModificationRequest, Verification};
use super::path::NodePath;
use super::rules::{
    AttributeNameRule, DisableOutputEscapingRule, ElementNameRule, EventHandlerRule,
    ScriptBlockRule, StyleAttributeRule, StyleBlockRule, StylesheetLinkRule, UrlAttributeRule,
};
use super::{AnalyzerRule, DetectContext, NodeRef};
use crate::dom::{Element, Node, OutputDocument};
use crate::error::{Error, Result};
use crate::request::RuleId;
use crate::schema::XsltSchema;
use crate::values::{TaintMarker, ValueLedger};

/// Attributes whose value is loaded or navigated to as a URL
const DEFAULT_URL_ATTRIBUTES: &[&str] = &[
    "action",
    "background",
    "cite",
    "codebase",
    "data",
    "formaction",
    "href",
    "longdesc",
    "lowsrc",
    "manifest",
    "poster",
    "src",
    "usemap",
    "xlink:href",
];

/// Configuration of the analyzer rules
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct AnalyzerConfig {
    /// Attribute names U.1 applies to, matched ignoring ASCII case
    pub url_attributes: Vec<String>,
    /// Attribute name A.1 tries to create
    pub attack_attribute_name: String,
    /// Element name E.1 tries to create
    pub attack_element_name: String,
    /// Maximum length of output samples in findings
    pub sample_length: usize,
}

impl Default for AnalyzerConfig {
    fn default() -> Self {
        Self {
            url_attributes: DEFAULT_URL_ATTRIBUTES.iter().map(|s| s.to_string()).collect(),
            attack_attribute_name: "style".to_string(),
            attack_element_name: "script".to_string(),
            sample_length: 80,
        }
    }
}

impl AnalyzerConfig {
    /// Create the default configuration
    pub fn new() -> Self {
        Self::default()
    }

    /// Replace the URL attribute allow-list
    pub fn with_url_attributes<I, S>(mut self, names: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.url_attributes = names.into_iter().map(Into::into).collect();
        self
    }

    /// Set the attribute name A.1 injects
    pub fn with_attack_attribute_name(mut self, name: impl Into<String>) -> Self {
        self.attack_attribute_name = name.into();
        self
    }

    /// Set the element name E.1 injects
    pub fn with_attack_element_name(mut self, name: impl Into<String>) -> Self {
        self.attack_element_name = name.into();
        self
    }

    /// Set the sample length
    pub fn with_sample_length(mut self, length: usize) -> Self {
        self.sample_length = length;
        self
    }

    /// Whether `name` is on the URL attribute allow-list
    pub fn is_url_attribute(&self, name: &str) -> bool {
        self.url_attributes
            .iter()
            .any(|candidate| candidate.eq_ignore_ascii_case(name))
    }
}

/// Registry of analyzer rules
pub struct AnalyzerEngine {
    rules: Vec<Box<dyn AnalyzerRule>>,
    config: AnalyzerConfig,
}

impl std::fmt::Debug for AnalyzerEngine {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AnalyzerEngine")
            .field("rules", &self.rule_ids())
            .field("config", &self.config)
            .finish()
    }
}

impl AnalyzerEngine {
    /// Create an engine without rules
    pub fn new(config: AnalyzerConfig) -> Self {
        Self {
            rules: Vec::new(),
            config,
        }
    }

    /// Create an engine with the built-in rules
    pub fn with_default_rules(config: AnalyzerConfig) -> Self {
        let rules: Vec<Box<dyn AnalyzerRule>> = vec![
            Box::new(AttributeNameRule),
            Box::new(ElementNameRule),
            Box::new(DisableOutputEscapingRule),
            Box::new(EventHandlerRule),
            Box::new(ScriptBlockRule),
            Box::new(StyleAttributeRule),
            Box::new(StyleBlockRule),
            Box::new(StylesheetLinkRule),
            Box::new(UrlAttributeRule),
        ];
        Self { rules, config }
    }

    /// Add a rule. Rule IDs must be unique.
    pub fn register(&mut self, rule: Box<dyn AnalyzerRule>) -> Result<()> {
        if self.rules.iter().any(|r| r.id() == rule.id()) {
            return Err(Error::Other(format!(
                "Analyzer rule {} is already registered",
                rule.id()
            )));
        }
        self.rules.push(rule);
        Ok(())
    }

    /// Look up a rule by ID
    pub fn rule(&self, id: &str) -> Result<&dyn AnalyzerRule> {
        self.rules
            .iter()
            .find(|r| r.id() == id)
            .map(|r| r.as_ref())
            .ok_or_else(|| Error::UnknownAnalyzerRule(id.to_string()))
    }

    /// IDs of the registered rules in registration order
    pub fn rule_ids(&self) -> Vec<&'static str> {
        self.rules.iter().map(|r| r.id()).collect()
    }

    /// The configuration
    pub fn config(&self) -> &AnalyzerConfig {
        &self.config
    }

    /// Detect phase over a whole output document.
    ///
    /// At most one request is returned per analyzer rule and generation rule,
    /// the first one in document order.
    pub fn analyze(
        &self,
        document: &OutputDocument,
        schema: &XsltSchema,
        ledger: &ValueLedger,
        marker: &TaintMarker,
    ) -> Vec<ModificationRequest> {
        let context = DetectContext {
            schema,
            ledger,
            marker,
            config: &self.config,
        };
        let mut seen: HashSet<(&'static str, RuleId)> = HashSet::new();
        let mut requests = Vec::new();

        let mut visit = |node: NodeRef<'_>| {
            for rule in &self.rules {
                if rule.category() != node.category() || !rule.is_applicable(&node, &self.config) {
                    continue;
                }
                for request in rule.detect(&node, &context) {
                    if seen.insert((rule.id(), request.generation_rule)) {
                        log::debug!(
                            "{} detected rule {} at {}",
                            request.analyzer_rule,
                            request.generation_rule,
                            request.payload.path
                        );
                        requests.push(request);
                    }
                }
            }
        };

        for (index, element) in document.elements().enumerate() {
            walk(element, NodePath::root().child(index), &mut visit);
        }
        requests
    }

    /// Verify phase of the rule that made a request
    pub fn verify(
        &self,
        request: &ModificationRequest,
        output: &OutputDocument,
    ) -> Result<Verification> {
        let rule = self.rule(&request.analyzer_rule)?;
        let verification = rule.verify(request, output);
        if let Verification::Refuted { reason } = &verification {
            log::debug!(
                "{} refuted for {}: {}",
                request.analyzer_rule,
                request.payload.schema_object,
                reason
            );
        }
        Ok(verification)
    }
}

/// Visit an element, its attributes and its text and data children, then
/// recurse into child elements
fn walk(element: &Element, path: NodePath, visit: &mut dyn FnMut(NodeRef<'_>)) {
    visit(NodeRef::Element {
        path: &path,
        element,
    });
    for (name, value) in &element.attributes {
        visit(NodeRef::Attribute {
            path: &path,
            element,
            name,
            value,
        });
    }

    let mut element_index = 0;
    for child in &element.children {
        match child {
            Node::Text(text) => visit(NodeRef::Text {
                path: &path,
                parent: element,
                text,
            }),
            Node::Data(text) => visit(NodeRef::Data {
                path: &path,
                parent: element,
                text,
            }),
            Node::Element(child) => {
                walk(child, path.child(element_index), visit);
                element_index += 1;
            }
        }
    }
}
