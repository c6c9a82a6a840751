//! The built-in analyzer rules

use once_cell::sync::Lazy;
use regex::Regex;
use url::Url;

use super::candidate::{ModificationRequest, Verification};
use super::engine::AnalyzerConfig;
use super::{start_tag, truncate, AnalyzerRule, NodeCategory, NodeRef};
use crate::dom::{Element, OutputDocument};

const SAMPLE_LENGTH: usize = 120;

static EVENT_HANDLER: Lazy<Regex> = Lazy::new(|| Regex::new(r"(?i)^on[a-z]+$").unwrap());

/// Base against which relative links are resolved
const LINK_BASE: &str = "http://xsltxss.invalid/";

fn relocate<'d>(
    request: &ModificationRequest,
    output: &'d OutputDocument,
) -> std::result::Result<&'d Element, Verification> {
    request.payload.path.resolve(output).ok_or_else(|| {
        Verification::refuted(format!(
            "No element at {} in the confirmation output",
            request.payload.path
        ))
    })
}

fn attribute_value<'n>(node: &NodeRef<'n>) -> Option<&'n str> {
    match *node {
        NodeRef::Attribute { value, .. } => Some(value),
        _ => None,
    }
}

fn text_value<'n>(node: &NodeRef<'n>) -> Option<&'n str> {
    match *node {
        NodeRef::Text { text, .. } | NodeRef::Data { text, .. } => Some(text),
        _ => None,
    }
}

fn confirmed(sample: String) -> Verification {
    Verification::Confirmed {
        output_sample: truncate(&sample, SAMPLE_LENGTH),
    }
}

/// Check that the replacement survived verbatim in one attribute
fn verify_attribute_contains(
    request: &ModificationRequest,
    output: &OutputDocument,
    attribute: &str,
) -> Verification {
    let element = match relocate(request, output) {
        Ok(element) => element,
        Err(refuted) => return refuted,
    };
    match element.attribute(attribute) {
        Some(value) if value.contains(&request.payload.replacement) => {
            confirmed(format!("{}=\"{}\"", attribute, value))
        }
        Some(_) => Verification::refuted(format!("'{}' is altered or escaped", attribute)),
        None => Verification::refuted(format!("'{}' is missing", attribute)),
    }
}

/// Check that the replacement survived verbatim in the data of an element
fn verify_data_contains(
    request: &ModificationRequest,
    output: &OutputDocument,
    element_name: &str,
) -> Verification {
    let element = match relocate(request, output) {
        Ok(element) => element,
        Err(refuted) => return refuted,
    };
    if !element.is_named(element_name) {
        return Verification::refuted(format!("Element is no longer '{}'", element_name));
    }
    let data = element.own_text();
    if data.contains(&request.payload.replacement) {
        confirmed(data)
    } else {
        Verification::refuted("Injected code is altered or escaped")
    }
}

/// A.1: a tracked value is written as an attribute name
#[derive(Debug, Clone, Copy, Default)]
pub struct AttributeNameRule;

impl AnalyzerRule for AttributeNameRule {
    fn id(&self) -> &'static str {
        "A.1"
    }

    fn description(&self) -> &'static str {
        "Attribute name built from input"
    }

    fn category(&self) -> NodeCategory {
        NodeCategory::Attribute
    }

    fn is_applicable(&self, node: &NodeRef<'_>, _config: &AnalyzerConfig) -> bool {
        matches!(node, NodeRef::Attribute { .. })
    }

    fn probe<'n>(&self, node: &NodeRef<'n>) -> Option<&'n str> {
        node.attribute_name()
    }

    fn replacement(&self, _marker: &str, config: &AnalyzerConfig) -> String {
        config.attack_attribute_name.clone()
    }

    fn verification_marker(&self, _marker: &str, config: &AnalyzerConfig) -> String {
        config.attack_attribute_name.clone()
    }

    fn verify(&self, request: &ModificationRequest, output: &OutputDocument) -> Verification {
        let element = match relocate(request, output) {
            Ok(element) => element,
            Err(refuted) => return refuted,
        };
        let attack = &request.payload.marker;
        let existed = request
            .payload
            .baseline_attributes
            .iter()
            .any(|name| name.eq_ignore_ascii_case(attack));
        if existed {
            return Verification::refuted(format!("'{}' was already present", attack));
        }
        match element.attribute(attack) {
            Some(_) => confirmed(start_tag(element)),
            None => Verification::refuted(format!("No new '{}' attribute", attack)),
        }
    }
}

/// E.1: a tracked value is written as an element name
#[derive(Debug, Clone, Copy, Default)]
pub struct ElementNameRule;

impl AnalyzerRule for ElementNameRule {
    fn id(&self) -> &'static str {
        "E.1"
    }

    fn description(&self) -> &'static str {
        "Element name built from input"
    }

    fn category(&self) -> NodeCategory {
        NodeCategory::Element
    }

    fn is_applicable(&self, node: &NodeRef<'_>, _config: &AnalyzerConfig) -> bool {
        matches!(node, NodeRef::Element { .. })
    }

    fn probe<'n>(&self, node: &NodeRef<'n>) -> Option<&'n str> {
        match *node {
            NodeRef::Element { element, .. } => Some(element.name.as_str()),
            _ => None,
        }
    }

    fn replacement(&self, _marker: &str, config: &AnalyzerConfig) -> String {
        config.attack_element_name.clone()
    }

    fn verification_marker(&self, _marker: &str, config: &AnalyzerConfig) -> String {
        config.attack_element_name.clone()
    }

    fn verify(&self, request: &ModificationRequest, output: &OutputDocument) -> Verification {
        let element = match relocate(request, output) {
            Ok(element) => element,
            Err(refuted) => return refuted,
        };
        if element.is_named(&request.payload.marker) {
            confirmed(start_tag(element))
        } else {
            Verification::refuted(format!("Element is '{}'", element.name))
        }
    }
}

/// E.3: text is written without output escaping, so markup in the input
/// becomes elements
#[derive(Debug, Clone, Copy, Default)]
pub struct DisableOutputEscapingRule;

impl AnalyzerRule for DisableOutputEscapingRule {
    fn id(&self) -> &'static str {
        "E.3"
    }

    fn description(&self) -> &'static str {
        "Text written with output escaping disabled"
    }

    fn category(&self) -> NodeCategory {
        NodeCategory::Text
    }

    fn is_applicable(&self, node: &NodeRef<'_>, _config: &AnalyzerConfig) -> bool {
        matches!(node, NodeRef::Text { .. })
    }

    fn probe<'n>(&self, node: &NodeRef<'n>) -> Option<&'n str> {
        text_value(node)
    }

    fn replacement(&self, marker: &str, _config: &AnalyzerConfig) -> String {
        format!("<{0}></{0}>", marker)
    }

    fn verify(&self, request: &ModificationRequest, output: &OutputDocument) -> Verification {
        let parent = match relocate(request, output) {
            Ok(element) => element,
            Err(refuted) => return refuted,
        };
        let marker = &request.payload.marker;
        let injected = parent
            .child_elements()
            .find_map(|child| child.find(&|e| e.is_named(marker)));
        match injected {
            Some(element) => confirmed(start_tag(element)),
            None => Verification::refuted("Injected markup was escaped"),
        }
    }
}

/// H.1: a tracked value is written into a JavaScript event handler
#[derive(Debug, Clone, Copy, Default)]
pub struct EventHandlerRule;

impl AnalyzerRule for EventHandlerRule {
    fn id(&self) -> &'static str {
        "H.1"
    }

    fn description(&self) -> &'static str {
        "Input inside an event handler attribute"
    }

    fn category(&self) -> NodeCategory {
        NodeCategory::Attribute
    }

    fn is_applicable(&self, node: &NodeRef<'_>, _config: &AnalyzerConfig) -> bool {
        node.attribute_name()
            .map_or(false, |name| EVENT_HANDLER.is_match(name))
    }

    fn probe<'n>(&self, node: &NodeRef<'n>) -> Option<&'n str> {
        attribute_value(node)
    }

    fn replacement(&self, marker: &str, _config: &AnalyzerConfig) -> String {
        format!("');{}();//", marker)
    }

    fn verify(&self, request: &ModificationRequest, output: &OutputDocument) -> Verification {
        match &request.payload.attribute {
            Some(attribute) => verify_attribute_contains(request, output, attribute),
            None => Verification::refuted("No handler attribute recorded"),
        }
    }
}

/// J.1: a tracked value is written into a script block
#[derive(Debug, Clone, Copy, Default)]
pub struct ScriptBlockRule;

impl AnalyzerRule for ScriptBlockRule {
    fn id(&self) -> &'static str {
        "J.1"
    }

    fn description(&self) -> &'static str {
        "Input inside a script block"
    }

    fn category(&self) -> NodeCategory {
        NodeCategory::Data
    }

    fn is_applicable(&self, node: &NodeRef<'_>, _config: &AnalyzerConfig) -> bool {
        matches!(node, NodeRef::Data { parent, .. } if parent.is_named("script"))
    }

    fn probe<'n>(&self, node: &NodeRef<'n>) -> Option<&'n str> {
        text_value(node)
    }

    fn replacement(&self, marker: &str, _config: &AnalyzerConfig) -> String {
        format!("';{}();//", marker)
    }

    fn verify(&self, request: &ModificationRequest, output: &OutputDocument) -> Verification {
        verify_data_contains(request, output, "script")
    }
}

/// S.1: a tracked value is written into a style attribute
#[derive(Debug, Clone, Copy, Default)]
pub struct StyleAttributeRule;

impl AnalyzerRule for StyleAttributeRule {
    fn id(&self) -> &'static str {
        "S.1"
    }

    fn description(&self) -> &'static str {
        "Input inside a style attribute"
    }

    fn category(&self) -> NodeCategory {
        NodeCategory::Attribute
    }

    fn is_applicable(&self, node: &NodeRef<'_>, _config: &AnalyzerConfig) -> bool {
        node.attribute_name()
            .map_or(false, |name| name.eq_ignore_ascii_case("style"))
    }

    fn probe<'n>(&self, node: &NodeRef<'n>) -> Option<&'n str> {
        attribute_value(node)
    }

    fn replacement(&self, marker: &str, _config: &AnalyzerConfig) -> String {
        format!("x;background:url({})", marker)
    }

    fn verify(&self, request: &ModificationRequest, output: &OutputDocument) -> Verification {
        verify_attribute_contains(request, output, "style")
    }
}

/// S.2: a tracked value is written into a style block
#[derive(Debug, Clone, Copy, Default)]
pub struct StyleBlockRule;

impl AnalyzerRule for StyleBlockRule {
    fn id(&self) -> &'static str {
        "S.2"
    }

    fn description(&self) -> &'static str {
        "Input inside a style block"
    }

    fn category(&self) -> NodeCategory {
        NodeCategory::Data
    }

    fn is_applicable(&self, node: &NodeRef<'_>, _config: &AnalyzerConfig) -> bool {
        matches!(node, NodeRef::Data { parent, .. } if parent.is_named("style"))
    }

    fn probe<'n>(&self, node: &NodeRef<'n>) -> Option<&'n str> {
        text_value(node)
    }

    fn replacement(&self, marker: &str, _config: &AnalyzerConfig) -> String {
        format!("}}{}{{background:url({})}}", marker, marker)
    }

    fn verify(&self, request: &ModificationRequest, output: &OutputDocument) -> Verification {
        verify_data_contains(request, output, "style")
    }
}

/// S.3: a tracked value controls the location of a linked stylesheet
#[derive(Debug, Clone, Copy, Default)]
pub struct StylesheetLinkRule;

impl AnalyzerRule for StylesheetLinkRule {
    fn id(&self) -> &'static str {
        "S.3"
    }

    fn description(&self) -> &'static str {
        "Input controls a stylesheet link"
    }

    fn category(&self) -> NodeCategory {
        NodeCategory::Attribute
    }

    fn is_applicable(&self, node: &NodeRef<'_>, _config: &AnalyzerConfig) -> bool {
        match *node {
            NodeRef::Attribute { element, name, .. } => {
                element.is_named("link")
                    && name.eq_ignore_ascii_case("href")
                    && element.attribute("rel").map_or(false, |rel| {
                        rel.split_whitespace()
                            .any(|r| r.eq_ignore_ascii_case("stylesheet"))
                    })
            }
            _ => false,
        }
    }

    fn probe<'n>(&self, node: &NodeRef<'n>) -> Option<&'n str> {
        attribute_value(node)
    }

    fn replacement(&self, marker: &str, _config: &AnalyzerConfig) -> String {
        format!("//{}.invalid/x.css", marker)
    }

    fn verify(&self, request: &ModificationRequest, output: &OutputDocument) -> Verification {
        let element = match relocate(request, output) {
            Ok(element) => element,
            Err(refuted) => return refuted,
        };
        let href = match element.attribute("href") {
            Some(href) => href,
            None => return Verification::refuted("'href' is missing"),
        };
        let expected_host = format!("{}.invalid", request.payload.marker);
        let resolved = Url::parse(LINK_BASE).and_then(|base| base.join(href.trim()));
        match resolved {
            Ok(url) if url.host_str() == Some(expected_host.as_str()) => {
                confirmed(format!("href=\"{}\"", href))
            }
            Ok(url) => Verification::refuted(format!(
                "Stylesheet loads from {}",
                url.host_str().unwrap_or("no host")
            )),
            Err(e) => Verification::refuted(format!("Unparseable href: {}", e)),
        }
    }
}

/// U.1: a tracked value controls a URL attribute
#[derive(Debug, Clone, Copy, Default)]
pub struct UrlAttributeRule;

impl AnalyzerRule for UrlAttributeRule {
    fn id(&self) -> &'static str {
        "U.1"
    }

    fn description(&self) -> &'static str {
        "Input controls a URL attribute"
    }

    fn category(&self) -> NodeCategory {
        NodeCategory::Attribute
    }

    fn is_applicable(&self, node: &NodeRef<'_>, config: &AnalyzerConfig) -> bool {
        node.attribute_name()
            .map_or(false, |name| config.is_url_attribute(name))
    }

    fn probe<'n>(&self, node: &NodeRef<'n>) -> Option<&'n str> {
        attribute_value(node)
    }

    fn replacement(&self, marker: &str, _config: &AnalyzerConfig) -> String {
        format!("javascript:{}()", marker)
    }

    fn verify(&self, request: &ModificationRequest, output: &OutputDocument) -> Verification {
        let element = match relocate(request, output) {
            Ok(element) => element,
            Err(refuted) => return refuted,
        };
        let attribute = match &request.payload.attribute {
            Some(attribute) => attribute,
            None => return Verification::refuted("No URL attribute recorded"),
        };
        let value = match element.attribute(attribute) {
            Some(value) => value,
            None => return Verification::refuted(format!("'{}' is missing", attribute)),
        };
        match Url::parse(value.trim()) {
            Ok(url) if url.scheme() == "javascript" && url.path().contains(&request.payload.marker) => {
                confirmed(format!("{}=\"{}\"", attribute, value))
            }
            Ok(url) => Verification::refuted(format!("URL scheme is '{}'", url.scheme())),
            Err(_) => Verification::refuted("URL does not start with a scheme"),
        }
    }
}
