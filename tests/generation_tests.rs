//! Plan and value generation against small schemas
//!
//! Covers the constraint guarantees of generated values, the arrangement
//! semantics of generated plans, reproducibility and the single-difference
//! property of confirmation plans.

use pretty_assertions::assert_eq;
use proptest::prelude::*;

use xsltxss::request::{ContentRule, GenerationRule, ValueRule};
use xsltxss::schema::{
    Arrangement, Attribute, DataConstraint, ElementType, SchemaObjectId, XsltSchema,
};
use xsltxss::{
    DocumentRenderer, GeneratorConfig, RawContentMode, Request, RequestGenerator, RuleId,
    TaintMarker, ValueLedger,
};

const RUNS: u64 = 50;

fn marker() -> TaintMarker {
    TaintMarker::new("zqx", 6).unwrap()
}

fn generate(schema: &XsltSchema, seed: u64) -> Request {
    RequestGenerator::seeded(GeneratorConfig::default(), seed)
        .generate_new_request(schema, RawContentMode::Full)
        .unwrap()
}

fn ledger(schema: &XsltSchema, request: &Request) -> ValueLedger {
    DocumentRenderer::new(schema, marker())
        .render(request)
        .unwrap()
        .ledger
}

fn values_of(schema: &XsltSchema, seed: u64, object: SchemaObjectId) -> Vec<String> {
    let request = generate(schema, seed);
    ledger(schema, &request)
        .by_object(object)
        .map(|d| d.value.clone())
        .collect()
}

fn child_targets(request: &Request) -> Vec<SchemaObjectId> {
    request
        .root()
        .content()
        .iter()
        .filter_map(|c| match c {
            ContentRule::Element(e) => Some(e.target()),
            _ => None,
        })
        .collect()
}

#[test]
fn test_max_length_values() {
    let b = ElementType::data("b", DataConstraint::string().with_max_length(5));
    let a = ElementType::element("a", Arrangement::Sequence)
        .with_attribute(Attribute::new("note", DataConstraint::string()).optional())
        .with_child(b.reference("b"));
    let b_id = b.id;
    let schema = XsltSchema::builder("a.xsl", 1)
        .root(a.reference("a"))
        .element_type(a)
        .element_type(b)
        .build()
        .unwrap();

    let mut seen = 0;
    for seed in 0..RUNS {
        for value in values_of(&schema, seed, b_id) {
            seen += 1;
            assert!(value.chars().count() <= 5, "{:?} is longer than 5", value);
            assert!(value.starts_with("zqx"), "{:?} lacks the prefix", value);
        }
    }
    assert_eq!(seen, RUNS as usize);
}

#[test]
fn test_fixed_values() {
    let color = Attribute::new(
        "color",
        DataConstraint::string().with_fixed_values(["red", "green"]),
    );
    let color_id = color.id;
    let item = ElementType::empty("item").with_attribute(color);
    let schema = XsltSchema::builder("item.xsl", 1)
        .root(item.reference("item"))
        .element_type(item)
        .build()
        .unwrap();

    for seed in 0..RUNS {
        let values = values_of(&schema, seed, color_id);
        assert_eq!(values.len(), 1);
        assert!(values[0] == "red" || values[0] == "green", "{:?}", values[0]);
    }
}

#[test]
fn test_interesting_values_mix_with_fresh_ones() {
    let kind = Attribute::new(
        "kind",
        DataConstraint::string().with_interesting_values(["alpha", "beta"]),
    );
    let kind_id = kind.id;
    let item = ElementType::empty("item").with_attribute(kind);
    let schema = XsltSchema::builder("item.xsl", 1)
        .root(item.reference("item"))
        .element_type(item)
        .build()
        .unwrap();

    let values: Vec<String> = (0..200).flat_map(|seed| values_of(&schema, seed, kind_id)).collect();
    assert!(values.iter().any(|v| v == "alpha" || v == "beta"));
    assert!(values.iter().any(|v| v.starts_with("zqx")));
}

#[test]
fn test_integer_range() {
    let size = Attribute::new("size", DataConstraint::integer().with_range(Some(-5), Some(5)));
    let size_id = size.id;
    let item = ElementType::empty("item").with_attribute(size);
    let schema = XsltSchema::builder("item.xsl", 1)
        .root(item.reference("item"))
        .element_type(item)
        .build()
        .unwrap();

    for seed in 0..RUNS {
        for value in values_of(&schema, seed, size_id) {
            let n: i64 = value.parse().unwrap();
            assert!((-5..=5).contains(&n), "{} out of range", n);
        }
    }
}

#[test]
fn test_choice_yields_one_child() {
    let x = ElementType::empty("x");
    let y = ElementType::empty("y");
    let z = ElementType::empty("z");
    let root = ElementType::element("root", Arrangement::Choice)
        .with_child(x.reference("x"))
        .with_child(y.reference("y").with_occurs(1, Some(4)))
        .with_child(z.reference("z"));
    let allowed: Vec<SchemaObjectId> = root.elements.iter().map(|r| r.id).collect();
    let schema = XsltSchema::builder("choice.xsl", 1)
        .root(root.reference("root"))
        .element_type(root)
        .element_type(x)
        .element_type(y)
        .element_type(z)
        .build()
        .unwrap();

    let mut chosen = std::collections::HashSet::new();
    for seed in 0..RUNS {
        let targets = child_targets(&generate(&schema, seed));
        assert_eq!(targets.len(), 1);
        assert!(allowed.contains(&targets[0]));
        chosen.insert(targets[0]);
    }
    assert!(chosen.len() > 1);
}

#[test]
fn test_sequence_order_and_counts() {
    let x = ElementType::empty("x");
    let y = ElementType::empty("y");
    let z = ElementType::empty("z");
    let root = ElementType::element("root", Arrangement::Sequence)
        .with_child(x.reference("x").with_occurs(1, Some(3)))
        .with_child(y.reference("y").with_occurs(0, Some(2)))
        .with_child(z.reference("z"));
    let refs: Vec<SchemaObjectId> = root.elements.iter().map(|r| r.id).collect();
    let schema = XsltSchema::builder("sequence.xsl", 1)
        .root(root.reference("root"))
        .element_type(root)
        .element_type(x)
        .element_type(y)
        .element_type(z)
        .build()
        .unwrap();

    for seed in 0..RUNS {
        let targets = child_targets(&generate(&schema, seed));
        let count = |id: SchemaObjectId| targets.iter().filter(|t| **t == id).count();
        assert!((1..=3).contains(&count(refs[0])));
        assert!(count(refs[1]) <= 2);
        assert_eq!(count(refs[2]), 1);

        // Declared order with contiguous repeats
        let positions: Vec<usize> = targets
            .iter()
            .map(|t| refs.iter().position(|r| r == t).unwrap())
            .collect();
        assert!(positions.windows(2).all(|w| w[0] <= w[1]), "{:?}", positions);
    }
}

#[test]
fn test_all_counts_and_interleaving() {
    let x = ElementType::empty("x");
    let y = ElementType::empty("y");
    let root = ElementType::element("root", Arrangement::All)
        .with_child(x.reference("x").with_occurs(1, Some(2)))
        .with_child(y.reference("y").with_occurs(0, Some(2)));
    let refs: Vec<SchemaObjectId> = root.elements.iter().map(|r| r.id).collect();
    let schema = XsltSchema::builder("all.xsl", 1)
        .root(root.reference("root"))
        .element_type(root)
        .element_type(x)
        .element_type(y)
        .build()
        .unwrap();

    let mut interleaved = false;
    for seed in 0..200 {
        let targets = child_targets(&generate(&schema, seed));
        let count = |id: SchemaObjectId| targets.iter().filter(|t| **t == id).count();
        assert!((1..=2).contains(&count(refs[0])), "{:?}", targets);
        assert!(count(refs[1]) <= 2, "{:?}", targets);
        assert!(targets.iter().all(|t| refs.contains(t)));

        // A y ahead of some x breaks declared order
        if let Some(first_y) = targets.iter().position(|t| *t == refs[1]) {
            interleaved |= targets[first_y..].contains(&refs[0]);
        }
    }
    assert!(interleaved);
}

#[test]
fn test_request_json_round_trip() {
    let schema = page_schema();
    let request = generate(&schema, 9);
    let json = request.to_json().unwrap();
    let restored = Request::from_json(&json).unwrap();
    assert_eq!(restored, request);

    let schema_json = schema.to_json().unwrap();
    let restored_schema = XsltSchema::from_json(&schema_json).unwrap();
    assert_eq!(restored_schema.to_json().unwrap(), schema_json);

    // Plans stay renderable against the restored schema with identical values
    let original: Vec<String> = ledger(&schema, &request).iter().map(|d| d.value.clone()).collect();
    let replayed: Vec<String> = ledger(&restored_schema, &restored)
        .iter()
        .map(|d| d.value.clone())
        .collect();
    assert_eq!(replayed, original);
}

fn page_schema() -> XsltSchema {
    let title = ElementType::data("title", DataConstraint::string());
    let para = ElementType::mixed("para");
    let page = ElementType::element("page", Arrangement::Sequence)
        .with_attribute(Attribute::new("id", DataConstraint::string()))
        .with_child(title.reference("title").with_occurs(1, Some(3)))
        .with_child(para.reference("para").with_occurs(0, Some(2)));
    XsltSchema::builder("page.xsl", 1)
        .root(page.reference("page"))
        .element_type(page)
        .element_type(title)
        .element_type(para)
        .build()
        .unwrap()
}

/// (rule, target, requested value) of every value rule in plan order
fn value_rules(request: &Request) -> Vec<(RuleId, SchemaObjectId, Option<String>)> {
    let mut rules = Vec::new();
    request.for_each_value_rule(&mut |rule: &dyn ValueRule| {
        rules.push((
            rule.id(),
            rule.target(),
            rule.requested_value().map(|v| v.value().to_string()),
        ));
    });
    rules
}

proptest! {
    #[test]
    fn prop_generation_is_reproducible(seed in any::<u64>()) {
        let schema = page_schema();
        let first = generate(&schema, seed);
        let second = generate(&schema, seed);
        prop_assert_eq!(&first, &second);
        prop_assert_eq!(first.to_json().unwrap(), second.to_json().unwrap());
    }

    #[test]
    fn prop_modify_changes_one_value(
        seed in any::<u64>(),
        pick in any::<prop::sample::Index>(),
        value in "[a-z]{1,8}",
    ) {
        let schema = page_schema();
        let original = generate(&schema, seed);
        let before = value_rules(&original);
        let (rule_id, object_id, _) = before[pick.index(before.len())].clone();

        let modified = original.modify(rule_id, object_id, value.as_str()).unwrap();
        let after = value_rules(&modified);

        prop_assert_eq!(before.len(), after.len());
        prop_assert_eq!(original.element_count(), modified.element_count());
        let mut differences = 0;
        for (b, a) in before.iter().zip(&after) {
            prop_assert_eq!(b.0, a.0);
            prop_assert_eq!(b.1, a.1);
            if b.2 != a.2 {
                differences += 1;
                prop_assert_eq!(a.0, rule_id);
                prop_assert_eq!(a.2.as_deref(), Some(value.as_str()));
            }
        }
        prop_assert_eq!(differences, 1);

        // The rendered documents differ in that one value only
        let original_values = ledger(&schema, &original);
        let modified_values = ledger(&schema, &modified);
        for (b, a) in original_values.iter().zip(modified_values.iter()) {
            if a.rule == rule_id {
                prop_assert_eq!(&a.value, &value);
                prop_assert!(a.requested);
            } else {
                prop_assert_eq!(&a.value, &b.value);
            }
        }
    }
}
