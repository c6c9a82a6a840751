//! Value generator
//!
//! Executes the scalar rules of one plan. Every rule draws from its own random
//! source, seeded from the plan's value seed and the rule ID, so two plans that
//! differ in one requested value produce documents that differ in exactly that
//! value.

use quick_xml::events::Event;
use quick_xml::Reader;
use rand::seq::SliceRandom;
use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha20Rng;
use serde::{Deserialize, Serialize};

use super::descriptor::{ValueDescriptor, ValueLedger};
use super::marker::{random_suffix, TaintMarker};
use crate::error::{Error, Result, StateError};
use crate::request::{RawContentMode, ValueRule};
use crate::schema::{DataConstraint, DataType, XsltSchema};

/// Markup wrapped around the marker in FULL raw content
const MARKUP_TEMPLATES: &[(&str, &str)] = &[
    ("<b>", "</b>"),
    ("<i>", "</i>"),
    ("<em>", "</em>"),
    ("<span>", "</span>"),
    ("<br/>", ""),
    ("", "<br/>"),
];

const FILLER_WORDS: &[&str] = &["lorem", "ipsum", "dolor", "sit", "amet"];

/// Value generator configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ValueConfig {
    /// Probability of synthesizing a fresh value instead of picking from an
    /// interesting value set
    pub fresh_value_probability: f64,
    /// Lower bound for integers without a declared minimum
    pub integer_min: i64,
    /// Upper bound for integers without a declared maximum
    pub integer_max: i64,
    /// Length of the random part appended to the marker prefix
    pub random_suffix_length: usize,
}

impl Default for ValueConfig {
    fn default() -> Self {
        Self {
            fresh_value_probability: 0.75,
            integer_min: i32::MIN as i64,
            integer_max: i32::MAX as i64,
            random_suffix_length: 6,
        }
    }
}

impl ValueConfig {
    /// Create a configuration with default values
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the fresh value probability
    pub fn with_fresh_value_probability(mut self, probability: f64) -> Self {
        self.fresh_value_probability = probability.clamp(0.0, 1.0);
        self
    }

    /// Set the default integer range
    pub fn with_integer_range(mut self, min: i64, max: i64) -> Self {
        self.integer_min = min.min(max);
        self.integer_max = max.max(min);
        self
    }

    /// Set the random suffix length
    pub fn with_random_suffix_length(mut self, length: usize) -> Self {
        self.random_suffix_length = length;
        self
    }
}

/// Produces concrete values for one plan execution and records their provenance
pub struct ValueGenerator<'s> {
    schema: &'s XsltSchema,
    marker: TaintMarker,
    config: ValueConfig,
    seed: u64,
    ledger: ValueLedger,
}

impl<'s> ValueGenerator<'s> {
    /// Create a generator with a fresh ledger
    pub fn new(schema: &'s XsltSchema, marker: TaintMarker, config: ValueConfig, seed: u64) -> Self {
        Self {
            schema,
            marker,
            config,
            seed,
            ledger: ValueLedger::new(),
        }
    }

    /// Taint marker in use
    pub fn marker(&self) -> &TaintMarker {
        &self.marker
    }

    /// Produce the value of one rule and record it.
    ///
    /// Fails only when the rule targets an object the schema does not have, or
    /// one that carries no value.
    pub fn generate_value(&mut self, rule: &dyn ValueRule) -> Result<String> {
        let object = self.schema.object(rule.target())?;
        let constraint = object.value_constraint().ok_or_else(|| {
            Error::from(
                StateError::new(format!("The {} carries no value", object.kind()))
                    .with_rule(rule.id())
                    .with_schema_object(rule.target()),
            )
        })?;
        let raw_mode = rule.raw_mode();

        if let Some(requested) = rule.requested_value() {
            if accepts_requested(&constraint, raw_mode, requested.value()) {
                let value = requested.value().to_string();
                self.record(rule, value.clone(), true);
                return Ok(value);
            }
            log::debug!(
                "Requested value for rule {} violates the constraints of {}, synthesizing",
                rule.id(),
                object.name()
            );
        }

        let mut rng = ChaCha20Rng::seed_from_u64(self.seed ^ rule.id().fold());
        let value = self.synthesize(&constraint, raw_mode, &mut rng);
        self.record(rule, value.clone(), false);
        Ok(value)
    }

    /// The ledger so far
    pub fn value_descriptors(&self) -> &ValueLedger {
        &self.ledger
    }

    /// Take the ledger, ending the execution
    pub fn into_ledger(self) -> ValueLedger {
        self.ledger
    }

    fn record(&mut self, rule: &dyn ValueRule, value: String, requested: bool) {
        let marker = self.marker.token_in(&value).map(str::to_string);
        self.ledger.record(ValueDescriptor {
            schema_object: rule.target(),
            rule: rule.id(),
            value,
            requested,
            marker,
        });
    }

    fn synthesize(
        &self,
        constraint: &DataConstraint,
        raw_mode: Option<RawContentMode>,
        rng: &mut ChaCha20Rng,
    ) -> String {
        // Seed values outside the schema's own bounds are never emitted
        let usable: Vec<&String> = constraint
            .discrete_values
            .iter()
            .filter(|v| accepts_requested(constraint, raw_mode, v))
            .collect();
        if constraint.has_fixed_set() {
            if let Some(value) = usable.choose(rng) {
                return (*value).clone();
            }
            log::debug!("No fixed value satisfies its own constraint, synthesizing");
        }
        if constraint.has_interesting_set() && !rng.gen_bool(self.config.fresh_value_probability.clamp(0.0, 1.0)) {
            if let Some(value) = usable.choose(rng) {
                return (*value).clone();
            }
        }

        match constraint.data_type {
            DataType::Boolean => ["true", "false"][rng.gen_range(0..2)].to_string(),
            DataType::Integer => self.integer(constraint, rng).to_string(),
            DataType::String | DataType::Other => match raw_mode {
                Some(RawContentMode::Full) => self.markup(rng),
                Some(RawContentMode::Restricted) => self.text(rng),
                None => self.tracked_string(constraint.max_length, rng),
            },
        }
    }

    /// Prefix plus random suffix, truncated to the maximum length
    fn tracked_string(&self, max_length: Option<usize>, rng: &mut ChaCha20Rng) -> String {
        let prefix = self.marker.prefix();
        let suffix_length = self
            .config
            .random_suffix_length
            .max(self.marker.min_length().saturating_sub(prefix.len()));
        let mut value = format!("{}{}", prefix, random_suffix(rng, suffix_length));
        if let Some(max) = max_length {
            value.truncate(max);
        }
        value
    }

    fn integer(&self, constraint: &DataConstraint, rng: &mut ChaCha20Rng) -> i64 {
        let high = constraint
            .max_value
            .unwrap_or_else(|| self.config.integer_max.max(constraint.min_value.unwrap_or(i64::MIN)));
        let low = constraint.min_value.unwrap_or_else(|| self.config.integer_min.min(high));
        if low >= high {
            return low;
        }
        rng.gen_range(low..=high)
    }

    fn markup(&self, rng: &mut ChaCha20Rng) -> String {
        let token = self.tracked_string(None, rng);
        let (open, close) = MARKUP_TEMPLATES[rng.gen_range(0..MARKUP_TEMPLATES.len())];
        let word = FILLER_WORDS[rng.gen_range(0..FILLER_WORDS.len())];
        format!("{} {}{}{}", word, open, token, close)
    }

    fn text(&self, rng: &mut ChaCha20Rng) -> String {
        let token = self.tracked_string(None, rng);
        let word = FILLER_WORDS[rng.gen_range(0..FILLER_WORDS.len())];
        format!("{} {}", word, token)
    }
}

fn accepts_requested(constraint: &DataConstraint, raw_mode: Option<RawContentMode>, value: &str) -> bool {
    if !constraint.accepts(value) {
        return false;
    }
    match raw_mode {
        Some(RawContentMode::Full) => is_well_formed_fragment(value),
        _ => true,
    }
}

/// Whether a string parses as element content
pub fn is_well_formed_fragment(fragment: &str) -> bool {
    let wrapped = format!("<fragment>{}</fragment>", fragment);
    let mut reader = Reader::from_str(&wrapped);
    reader.check_end_names(true);

    let mut depth = 0usize;
    loop {
        match reader.read_event() {
            Ok(Event::Start(_)) => depth += 1,
            Ok(Event::End(_)) => {
                if depth == 0 {
                    return false;
                }
                depth -= 1;
            }
            Ok(Event::Text(text)) => {
                if text.unescape().is_err() {
                    return false;
                }
            }
            Ok(Event::Empty(start)) => {
                if start.attributes().any(|a| a.is_err()) {
                    return false;
                }
            }
            Ok(Event::Decl(_) | Event::DocType(_) | Event::PI(_)) => return false,
            Ok(Event::Eof) => return depth == 0,
            Ok(_) => {}
            Err(_) => return false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::request::{
        AddDataContentRule, AddRawContentRule, RequestedValue, RuleId, SetAttributeRule,
    };
    use crate::schema::{Attribute, ElementType, SchemaObjectId};

    struct Fixture {
        schema: XsltSchema,
        short: SchemaObjectId,
        color: SchemaObjectId,
        count: SchemaObjectId,
        flag: SchemaObjectId,
        para: SchemaObjectId,
        tagged: SchemaObjectId,
    }

    fn fixture() -> Fixture {
        let short = ElementType::data("short", DataConstraint::string().with_max_length(5));
        let para = ElementType::mixed("para");
        let item = ElementType::empty("item")
            .with_attribute(Attribute::new(
                "color",
                DataConstraint::string().with_fixed_values(["red", "green"]),
            ))
            .with_attribute(Attribute::new(
                "count",
                DataConstraint::integer().with_range(Some(-3), Some(7)),
            ))
            .with_attribute(Attribute::new("flag", DataConstraint::boolean()))
            .with_attribute(Attribute::new(
                "tag",
                DataConstraint::string().with_interesting_values(["new", "old"]),
            ));
        Fixture {
            short: short.id,
            color: item.attributes[0].id,
            count: item.attributes[1].id,
            flag: item.attributes[2].id,
            tagged: item.attributes[3].id,
            para: para.id,
            schema: XsltSchema::builder("values.xsl", 1)
                .root(item.reference("item"))
                .element_type(item)
                .element_type(short)
                .element_type(para)
                .build()
                .unwrap(),
        }
    }

    fn marker() -> TaintMarker {
        TaintMarker::new("zqx", 6).unwrap()
    }

    fn ids(n: usize) -> Vec<RuleId> {
        let mut rng = ChaCha20Rng::seed_from_u64(99);
        (0..n).map(|_| RuleId::random(&mut rng)).collect()
    }

    #[test]
    fn test_string_respects_max_length_and_prefix() {
        let f = fixture();
        let mut generator = ValueGenerator::new(&f.schema, marker(), ValueConfig::default(), 1);
        for id in ids(50) {
            let value = generator
                .generate_value(&AddDataContentRule::new(id, f.short))
                .unwrap();
            assert!(value.len() <= 5);
            assert!(value.starts_with("zqx"));
        }
        assert_eq!(generator.value_descriptors().len(), 50);
    }

    #[test]
    fn test_fixed_integer_boolean() {
        let f = fixture();
        let mut generator = ValueGenerator::new(&f.schema, marker(), ValueConfig::default(), 2);
        for id in ids(50) {
            let color = generator.generate_value(&SetAttributeRule::new(id, f.color)).unwrap();
            assert!(color == "red" || color == "green");

            let count: i64 = generator
                .generate_value(&SetAttributeRule::new(id, f.count))
                .unwrap()
                .parse()
                .unwrap();
            assert!((-3..=7).contains(&count));

            let flag = generator.generate_value(&SetAttributeRule::new(id, f.flag)).unwrap();
            assert!(flag == "true" || flag == "false");
        }
    }

    #[test]
    fn test_interesting_set_mixes_seed_and_fresh_values() {
        let f = fixture();
        let mut generator = ValueGenerator::new(&f.schema, marker(), ValueConfig::default(), 3);
        let values: Vec<String> = ids(100)
            .into_iter()
            .map(|id| generator.generate_value(&SetAttributeRule::new(id, f.tagged)).unwrap())
            .collect();
        assert!(values.iter().any(|v| v == "new" || v == "old"));
        assert!(values.iter().any(|v| v.starts_with("zqx")));
    }

    #[test]
    fn test_requested_value_used_when_valid() {
        let f = fixture();
        let id = ids(1)[0];
        let mut generator = ValueGenerator::new(&f.schema, marker(), ValueConfig::default(), 4);

        let rule = SetAttributeRule::new(id, f.color).with_requested_value(RequestedValue::new("green"));
        assert_eq!(generator.generate_value(&rule).unwrap(), "green");
        assert!(generator.value_descriptors().by_rule(id).unwrap().requested);
    }

    #[test]
    fn test_invalid_requested_value_falls_back() {
        let f = fixture();
        let id = ids(1)[0];
        let mut generator = ValueGenerator::new(&f.schema, marker(), ValueConfig::default(), 5);

        let too_long = AddDataContentRule::new(id, f.short).with_requested_value(RequestedValue::new("toolong"));
        let value = generator.generate_value(&too_long).unwrap();
        assert!(value.len() <= 5);

        let outside = SetAttributeRule::new(id, f.color).with_requested_value(RequestedValue::new("blue"));
        assert_ne!(generator.generate_value(&outside).unwrap(), "blue");

        let out_of_range = SetAttributeRule::new(id, f.count).with_requested_value(RequestedValue::new("8"));
        assert_ne!(generator.generate_value(&out_of_range).unwrap(), "8");

        assert!(generator.value_descriptors().iter().all(|d| !d.requested));
    }

    #[test]
    fn test_raw_content_modes() {
        let f = fixture();
        let mut generator = ValueGenerator::new(&f.schema, marker(), ValueConfig::default(), 6);
        for id in ids(20) {
            let full = generator
                .generate_value(&AddRawContentRule::new(id, f.para, RawContentMode::Full))
                .unwrap();
            assert!(is_well_formed_fragment(&full));

            let restricted = generator
                .generate_value(&AddRawContentRule::new(id, f.para, RawContentMode::Restricted))
                .unwrap();
            assert!(!restricted.contains('<') && !restricted.contains('&'));
        }
        assert_eq!(generator.value_descriptors().tracked().count(), 40);
    }

    #[test]
    fn test_requested_raw_markup_must_be_well_formed() {
        let f = fixture();
        let id = ids(1)[0];
        let mut generator = ValueGenerator::new(&f.schema, marker(), ValueConfig::default(), 7);

        let broken = AddRawContentRule::new(id, f.para, RawContentMode::Full)
            .with_requested_value(RequestedValue::new("<m>"));
        assert_ne!(generator.generate_value(&broken).unwrap(), "<m>");

        let ok = AddRawContentRule::new(id, f.para, RawContentMode::Full)
            .with_requested_value(RequestedValue::new("<m></m>"));
        assert_eq!(generator.generate_value(&ok).unwrap(), "<m></m>");
    }

    #[test]
    fn test_same_rule_same_value() {
        let f = fixture();
        let id = ids(1)[0];
        let mut a = ValueGenerator::new(&f.schema, marker(), ValueConfig::default(), 8);
        let mut b = ValueGenerator::new(&f.schema, marker(), ValueConfig::default(), 8);
        let rule = AddDataContentRule::new(id, f.short);
        assert_eq!(a.generate_value(&rule).unwrap(), b.generate_value(&rule).unwrap());
    }

    #[test]
    fn test_unknown_target_is_error() {
        let f = fixture();
        let mut generator = ValueGenerator::new(&f.schema, marker(), ValueConfig::default(), 9);
        let rule = SetAttributeRule::new(ids(1)[0], SchemaObjectId::new());
        assert!(matches!(
            generator.generate_value(&rule),
            Err(Error::UnknownSchemaObject(_))
        ));
    }

    #[test]
    fn test_well_formed_fragment() {
        assert!(is_well_formed_fragment("plain text"));
        assert!(is_well_formed_fragment("a <b>bold</b> &amp; <br/>"));
        assert!(!is_well_formed_fragment("<b>open"));
        assert!(!is_well_formed_fragment("</b>"));
        assert!(!is_well_formed_fragment("<b></i>"));
    }

    #[test]
    fn test_prolog_markup_is_not_content() {
        assert!(!is_well_formed_fragment("<!DOCTYPE x>"));
        assert!(!is_well_formed_fragment(r#"<?xml version="1.0"?>"#));
        assert!(!is_well_formed_fragment("text <?php echo 1 ?>"));
        assert!(is_well_formed_fragment("a <!-- note --> b"));

        let f = fixture();
        let id = ids(1)[0];
        let mut generator = ValueGenerator::new(&f.schema, marker(), ValueConfig::default(), 10);
        let doctype = AddRawContentRule::new(id, f.para, RawContentMode::Full)
            .with_requested_value(RequestedValue::new("<!DOCTYPE x>"));
        let value = generator.generate_value(&doctype).unwrap();
        assert_ne!(value, "<!DOCTYPE x>");
        assert!(is_well_formed_fragment(&value));
    }

    #[test]
    fn test_seed_values_outside_bounds_are_skipped() {
        let long = Attribute::new(
            "long",
            DataConstraint::string()
                .with_max_length(4)
                .with_interesting_values(["fits", "much too long"]),
        );
        let ranged = Attribute::new(
            "ranged",
            DataConstraint::integer()
                .with_range(Some(0), Some(10))
                .with_fixed_values(["5", "42"]),
        );
        let stale = Attribute::new(
            "stale",
            DataConstraint::string()
                .with_max_length(3)
                .with_fixed_values(["toolong"]),
        );
        let (long_id, ranged_id, stale_id) = (long.id, ranged.id, stale.id);
        let item = ElementType::empty("item")
            .with_attribute(long)
            .with_attribute(ranged)
            .with_attribute(stale);
        let schema = XsltSchema::builder("bounds.xsl", 1)
            .root(item.reference("item"))
            .element_type(item)
            .build()
            .unwrap();

        let mut generator = ValueGenerator::new(&schema, marker(), ValueConfig::default(), 11);
        for id in ids(100) {
            let value = generator.generate_value(&SetAttributeRule::new(id, long_id)).unwrap();
            assert!(value.chars().count() <= 4, "{:?}", value);

            let value = generator.generate_value(&SetAttributeRule::new(id, ranged_id)).unwrap();
            assert_eq!(value, "5");

            let value = generator.generate_value(&SetAttributeRule::new(id, stale_id)).unwrap();
            assert!(value.chars().count() <= 3, "{:?}", value);
        }
    }
}
