//! Request generator
//!
//! Walks the schema from a chosen root element and decides how many times each
//! child reference is instantiated, which optional attributes appear and where
//! raw content goes in mixed elements. All decisions come from one random
//! source, so a seeded generator reproduces its plans exactly.

use rand::seq::SliceRandom;
use rand::{Rng, RngCore, SeedableRng};
use rand_chacha::ChaCha20Rng;
use serde::{Deserialize, Serialize};

use super::plan::Request;
use super::rules::{
    AddDataContentRule, AddElementRule, AddRawContentRule, ContentRule, ExtensionFunctionRule,
    RawContentMode, RuleId, SetAttributeRule, StylesheetParameterRule,
};
use crate::error::{Error, Result};
use crate::limits::Limits;
use crate::schema::{Arrangement, ContentType, ElementReference, ElementType, SchemaObjectId, XsltSchema};

/// Request generator configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct GeneratorConfig {
    /// Expansion limits
    pub limits: Limits,
    /// Probability that an optional attribute is included
    pub optional_attribute_probability: f64,
    /// Probability of a raw content rule in each gap between the children of
    /// a mixed element
    pub raw_content_probability: f64,
}

impl Default for GeneratorConfig {
    fn default() -> Self {
        Self {
            limits: Limits::default(),
            optional_attribute_probability: 0.5,
            raw_content_probability: 0.5,
        }
    }
}

impl GeneratorConfig {
    /// Create a configuration with default values
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the limits
    pub fn with_limits(mut self, limits: Limits) -> Self {
        self.limits = limits;
        self
    }

    /// Set the optional attribute probability
    pub fn with_optional_attribute_probability(mut self, probability: f64) -> Self {
        self.optional_attribute_probability = probability.clamp(0.0, 1.0);
        self
    }

    /// Set the raw content probability
    pub fn with_raw_content_probability(mut self, probability: f64) -> Self {
        self.raw_content_probability = probability.clamp(0.0, 1.0);
        self
    }
}

/// Policy choosing the document root among the schema's root elements
pub trait RootSelector: Send + Sync {
    /// Pick one root reference
    fn select<'s>(
        &self,
        roots: &'s [ElementReference],
        rng: &mut dyn RngCore,
    ) -> Option<&'s ElementReference>;
}

/// Picks every root with equal probability
#[derive(Debug, Clone, Copy, Default)]
pub struct UniformRootSelector;

impl RootSelector for UniformRootSelector {
    fn select<'s>(
        &self,
        roots: &'s [ElementReference],
        rng: &mut dyn RngCore,
    ) -> Option<&'s ElementReference> {
        roots.choose(rng)
    }
}

/// Produces generation plans from a schema
pub struct RequestGenerator<R = ChaCha20Rng> {
    config: GeneratorConfig,
    rng: R,
    root_selector: Box<dyn RootSelector>,
}

impl RequestGenerator<ChaCha20Rng> {
    /// Generator with a reproducible random source
    pub fn seeded(config: GeneratorConfig, seed: u64) -> Self {
        Self::new(config, ChaCha20Rng::seed_from_u64(seed))
    }
}

impl<R: Rng> RequestGenerator<R> {
    /// Generator over any random source
    pub fn new(config: GeneratorConfig, rng: R) -> Self {
        Self {
            config,
            rng,
            root_selector: Box::new(UniformRootSelector),
        }
    }

    /// Replace the root selection policy
    pub fn with_root_selector(mut self, selector: impl RootSelector + 'static) -> Self {
        self.root_selector = Box::new(selector);
        self
    }

    /// Generator configuration
    pub fn config(&self) -> &GeneratorConfig {
        &self.config
    }

    /// Generate a fresh plan. Never mutates the schema.
    pub fn generate_new_request(
        &mut self,
        schema: &XsltSchema,
        mode: RawContentMode,
    ) -> Result<Request> {
        let value_seed = self.rng.gen::<u64>();

        let root = self
            .root_selector
            .select(schema.root_elements(), &mut self.rng)
            .ok_or_else(|| {
                Error::Schema(format!(
                    "Schema for '{}' has no root elements",
                    schema.stylesheet_uri()
                ))
            })?;

        let mut element_count = 0;
        let root_rule = self.generate_element(schema, root, mode, &mut element_count)?;

        let extension_functions = schema
            .extension_functions()
            .iter()
            .map(|f| ExtensionFunctionRule::new(RuleId::random(&mut self.rng), f.id))
            .collect();
        let stylesheet_parameters = schema
            .stylesheet_parameters()
            .iter()
            .map(|p| StylesheetParameterRule::new(RuleId::random(&mut self.rng), p.id))
            .collect();

        log::debug!(
            "Generated plan for root '{}' with {} element rules",
            root.name,
            element_count
        );

        Ok(Request::new(
            schema.stylesheet_uri(),
            schema.version(),
            value_seed,
            root_rule,
            extension_functions,
            stylesheet_parameters,
        ))
    }

    /// Derive a confirmation plan, see [`Request::modify`]
    pub fn modify_request(
        original: &Request,
        rule_id: RuleId,
        object_id: SchemaObjectId,
        value: impl Into<String>,
    ) -> Result<Request> {
        original.modify(rule_id, object_id, value)
    }

    fn next_id(&mut self) -> RuleId {
        RuleId::random(&mut self.rng)
    }

    fn generate_element(
        &mut self,
        schema: &XsltSchema,
        reference: &ElementReference,
        mode: RawContentMode,
        element_count: &mut usize,
    ) -> Result<AddElementRule> {
        *element_count += 1;
        let element_type = schema.referenced_type(reference)?;
        let mut builder = AddElementRule::builder(self.next_id(), reference.id);

        for attribute in &element_type.attributes {
            let include = !attribute.optional
                || self
                    .rng
                    .gen_bool(self.config.optional_attribute_probability.clamp(0.0, 1.0));
            if include {
                builder = builder.attribute(SetAttributeRule::new(self.next_id(), attribute.id));
            }
        }

        match element_type.content_type {
            ContentType::Empty => {}
            ContentType::Data => {
                let rule = AddDataContentRule::new(self.next_id(), element_type.id);
                builder = builder.content(ContentRule::Data(rule));
            }
            ContentType::Element => {
                let children = self.generate_children(schema, element_type, mode, element_count)?;
                builder = builder.contents(children);
            }
            ContentType::Mixed => {
                let children = self.generate_mixed(schema, element_type, mode, element_count)?;
                builder = builder.contents(children);
            }
        }

        Ok(builder.build())
    }

    /// Instantiation list of child references, honouring the arrangement
    fn plan_children<'s>(&mut self, element_type: &'s ElementType) -> Vec<&'s ElementReference> {
        let limits = &self.config.limits;
        match element_type.arrangement {
            Arrangement::Sequence => {
                let mut planned = Vec::new();
                for reference in &element_type.elements {
                    let upper = limits.occurrence_upper_bound(reference.min_occurs, reference.max_occurs);
                    let count = self.rng.gen_range(reference.min_occurs..=upper);
                    planned.extend(std::iter::repeat(reference).take(count as usize));
                }
                planned
            }
            Arrangement::All => {
                let mut planned = Vec::new();
                for reference in &element_type.elements {
                    let upper = limits.occurrence_upper_bound(reference.min_occurs, reference.max_occurs);
                    let count = self.rng.gen_range(reference.min_occurs..=upper);
                    planned.extend(std::iter::repeat(reference).take(count as usize));
                }
                planned.shuffle(&mut self.rng);
                planned
            }
            Arrangement::Choice => element_type.elements.choose(&mut self.rng).into_iter().collect(),
        }
    }

    fn generate_children(
        &mut self,
        schema: &XsltSchema,
        element_type: &ElementType,
        mode: RawContentMode,
        element_count: &mut usize,
    ) -> Result<Vec<ContentRule>> {
        if !self.config.limits.allows_expansion(*element_count) {
            log::debug!(
                "Element ceiling {} reached, not expanding '{}'",
                self.config.limits.max_elements,
                element_type.name
            );
            return Ok(Vec::new());
        }

        let planned = self.plan_children(element_type);
        let mut children = Vec::with_capacity(planned.len());
        for reference in planned {
            if !self.config.limits.allows_expansion(*element_count) {
                break;
            }
            let child = self.generate_element(schema, reference, mode, element_count)?;
            children.push(ContentRule::Element(child));
        }
        Ok(children)
    }

    fn generate_mixed(
        &mut self,
        schema: &XsltSchema,
        element_type: &ElementType,
        mode: RawContentMode,
        element_count: &mut usize,
    ) -> Result<Vec<ContentRule>> {
        if element_type.elements.is_empty() {
            let raw = AddRawContentRule::new(self.next_id(), element_type.id, mode);
            return Ok(vec![ContentRule::Raw(raw)]);
        }

        let children = self.generate_children(schema, element_type, mode, element_count)?;
        let probability = self.config.raw_content_probability.clamp(0.0, 1.0);
        let gaps: Vec<bool> = (0..=children.len()).map(|_| self.rng.gen_bool(probability)).collect();
        let forced_gap = if gaps.iter().any(|g| *g) {
            None
        } else {
            Some(self.rng.gen_range(0..gaps.len()))
        };

        let mut content = Vec::with_capacity(children.len() * 2 + 1);
        let mut children = children.into_iter();
        for (gap, raw) in gaps.iter().enumerate() {
            if *raw || forced_gap == Some(gap) {
                let rule = AddRawContentRule::new(self.next_id(), element_type.id, mode);
                content.push(ContentRule::Raw(rule));
            }
            if let Some(child) = children.next() {
                content.push(child);
            }
        }
        Ok(content)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::request::GenerationRule;
    use crate::schema::{Attribute, DataConstraint};
    use pretty_assertions::assert_eq;

    fn choice_schema() -> (XsltSchema, Vec<SchemaObjectId>) {
        let a = ElementType::data("a", DataConstraint::string());
        let b = ElementType::empty("b");
        let c = ElementType::data("c", DataConstraint::integer());
        let refs = vec![a.reference("a"), b.reference("b"), c.reference("c").with_occurs(2, Some(5))];
        let ids = refs.iter().map(|r| r.id).collect();
        let mut root = ElementType::element("root", Arrangement::Choice);
        root.elements = refs;
        let schema = XsltSchema::builder("choice.xsl", 1)
            .root(root.reference("root"))
            .element_type(root)
            .element_type(a)
            .element_type(b)
            .element_type(c)
            .build()
            .unwrap();
        (schema, ids)
    }

    #[test]
    fn test_choice_yields_exactly_one_child() {
        let (schema, ids) = choice_schema();
        let mut generator = RequestGenerator::seeded(GeneratorConfig::default(), 3);
        for _ in 0..50 {
            let request = generator.generate_new_request(&schema, RawContentMode::Full).unwrap();
            let content = request.root().content();
            assert_eq!(content.len(), 1);
            assert!(ids.contains(&content[0].target()));
        }
    }

    #[test]
    fn test_mandatory_and_optional_attributes() {
        let doc = ElementType::empty("doc")
            .with_attribute(Attribute::new("id", DataConstraint::string()))
            .with_attribute(Attribute::new("class", DataConstraint::string()).optional());
        let schema = XsltSchema::builder("attrs.xsl", 1)
            .root(doc.reference("doc"))
            .element_type(doc.clone())
            .build()
            .unwrap();

        let mut generator = RequestGenerator::seeded(GeneratorConfig::default(), 11);
        let mut with_optional = 0;
        for _ in 0..100 {
            let request = generator.generate_new_request(&schema, RawContentMode::Full).unwrap();
            let attributes = request.root().attributes();
            assert_eq!(attributes[0].target(), doc.attributes[0].id);
            if attributes.len() == 2 {
                with_optional += 1;
            }
        }
        assert!(with_optional > 0 && with_optional < 100);

        let config = GeneratorConfig::default().with_optional_attribute_probability(0.0);
        let mut generator = RequestGenerator::seeded(config, 11);
        let request = generator.generate_new_request(&schema, RawContentMode::Full).unwrap();
        assert_eq!(request.root().attributes().len(), 1);
    }

    #[test]
    fn test_mixed_without_children_has_single_raw_rule() {
        let para = ElementType::mixed("para");
        let schema = XsltSchema::builder("mixed.xsl", 1)
            .root(para.reference("p"))
            .element_type(para)
            .build()
            .unwrap();

        let mut generator = RequestGenerator::seeded(GeneratorConfig::default(), 5);
        let request = generator
            .generate_new_request(&schema, RawContentMode::Restricted)
            .unwrap();
        let content = request.root().content();
        assert_eq!(content.len(), 1);
        match &content[0] {
            ContentRule::Raw(raw) => assert_eq!(raw.mode(), RawContentMode::Restricted),
            other => panic!("expected raw content, got {:?}", other),
        }
    }

    #[test]
    fn test_mixed_with_children_intersperses_raw_content() {
        let em = ElementType::data("em", DataConstraint::string());
        let mut para = ElementType::mixed("para");
        para.elements.push(em.reference("em").with_occurs(1, Some(3)));
        let schema = XsltSchema::builder("mixed.xsl", 1)
            .root(para.reference("p"))
            .element_type(para)
            .element_type(em)
            .build()
            .unwrap();

        let mut generator = RequestGenerator::seeded(GeneratorConfig::default(), 9);
        for _ in 0..20 {
            let request = generator.generate_new_request(&schema, RawContentMode::Full).unwrap();
            let content = request.root().content();
            let raw = content.iter().filter(|c| matches!(c, ContentRule::Raw(_))).count();
            let elements = content.iter().filter(|c| matches!(c, ContentRule::Element(_))).count();
            assert!(raw >= 1 && raw <= elements + 1);
            assert!((1..=3).contains(&elements));
        }
    }

    #[test]
    fn test_element_ceiling_stops_cycles() {
        let mut node = ElementType::element("node", Arrangement::Sequence);
        let self_ref = node.reference("node").with_occurs(1, None);
        node.elements.push(self_ref);
        let schema = XsltSchema::builder("cycle.xsl", 1)
            .root(node.reference("node"))
            .element_type(node)
            .build()
            .unwrap();

        let config = GeneratorConfig::default().with_limits(Limits::default().with_max_elements(25));
        let mut generator = RequestGenerator::seeded(config, 1);
        let request = generator.generate_new_request(&schema, RawContentMode::Full).unwrap();
        assert!(request.element_count() <= 25);
        assert!(request.element_count() > 1);
    }

    #[test]
    fn test_same_seed_same_plan() {
        let (schema, _) = choice_schema();
        let mut first = RequestGenerator::seeded(GeneratorConfig::default(), 77);
        let mut second = RequestGenerator::seeded(GeneratorConfig::default(), 77);
        for _ in 0..10 {
            assert_eq!(
                first.generate_new_request(&schema, RawContentMode::Full).unwrap(),
                second.generate_new_request(&schema, RawContentMode::Full).unwrap()
            );
        }
    }

    #[test]
    fn test_no_roots_is_error() {
        let (schema, _) = choice_schema();
        let json = schema.to_json().unwrap();
        let mut value: serde_json::Value = serde_json::from_str(&json).unwrap();
        value["root_elements"] = serde_json::json!([]);
        let rootless = XsltSchema::from_json(&value.to_string()).unwrap();

        let mut generator = RequestGenerator::seeded(GeneratorConfig::default(), 1);
        let result = generator.generate_new_request(&rootless, RawContentMode::Full);
        assert!(matches!(result, Err(Error::Schema(_))));
    }
}
