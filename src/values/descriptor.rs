//! Provenance ledger of generated values

use serde::{Deserialize, Serialize};
use std::collections::HashMap;

use crate::request::RuleId;
use crate::schema::SchemaObjectId;

/// Links one emitted value to the schema object and rule that produced it
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ValueDescriptor {
    /// Schema object the value is bound to
    pub schema_object: SchemaObjectId,
    /// Generation rule that produced the value
    pub rule: RuleId,
    /// The value as written into the document
    pub value: String,
    /// Whether the value is a pinned requested value
    pub requested: bool,
    /// Tracked token embedded in the value, if any
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub marker: Option<String>,
}

impl ValueDescriptor {
    /// Whether the value carries a tracked token
    pub fn is_tracked(&self) -> bool {
        self.marker.is_some()
    }
}

/// Append-only ledger for one plan execution
#[derive(Debug, Clone, Default)]
pub struct ValueLedger {
    descriptors: Vec<ValueDescriptor>,
    by_rule: HashMap<RuleId, usize>,
    by_object: HashMap<SchemaObjectId, Vec<usize>>,
}

impl ValueLedger {
    /// Create an empty ledger
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a descriptor
    pub fn record(&mut self, descriptor: ValueDescriptor) {
        let index = self.descriptors.len();
        self.by_rule.insert(descriptor.rule, index);
        self.by_object
            .entry(descriptor.schema_object)
            .or_default()
            .push(index);
        self.descriptors.push(descriptor);
    }

    /// Descriptor produced by a rule
    pub fn by_rule(&self, rule: RuleId) -> Option<&ValueDescriptor> {
        self.by_rule.get(&rule).map(|&i| &self.descriptors[i])
    }

    /// Descriptors bound to a schema object, in generation order
    pub fn by_object(&self, object: SchemaObjectId) -> impl Iterator<Item = &ValueDescriptor> {
        self.by_object
            .get(&object)
            .into_iter()
            .flatten()
            .map(move |&i| &self.descriptors[i])
    }

    /// All descriptors in generation order
    pub fn iter(&self) -> impl Iterator<Item = &ValueDescriptor> {
        self.descriptors.iter()
    }

    /// Descriptors carrying a tracked token
    pub fn tracked(&self) -> impl Iterator<Item = &ValueDescriptor> {
        self.descriptors.iter().filter(|d| d.is_tracked())
    }

    /// Tracked descriptors whose token occurs in a piece of output text
    pub fn find_in<'a>(&'a self, text: &'a str) -> impl Iterator<Item = &'a ValueDescriptor> + 'a {
        self.tracked().filter(move |d| match &d.marker {
            Some(marker) => text.contains(marker.as_str()),
            None => false,
        })
    }

    /// Number of descriptors
    pub fn len(&self) -> usize {
        self.descriptors.len()
    }

    /// Whether the ledger is empty
    pub fn is_empty(&self) -> bool {
        self.descriptors.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::SeedableRng;
    use rand_chacha::ChaCha20Rng;

    fn descriptor(rule: RuleId, object: SchemaObjectId, value: &str, marker: Option<&str>) -> ValueDescriptor {
        ValueDescriptor {
            schema_object: object,
            rule,
            value: value.to_string(),
            requested: false,
            marker: marker.map(str::to_string),
        }
    }

    #[test]
    fn test_lookup_by_rule_and_object() {
        let mut rng = ChaCha20Rng::seed_from_u64(0);
        let (r1, r2, r3) = (
            RuleId::random(&mut rng),
            RuleId::random(&mut rng),
            RuleId::random(&mut rng),
        );
        let shared = SchemaObjectId::new();
        let other = SchemaObjectId::new();

        let mut ledger = ValueLedger::new();
        ledger.record(descriptor(r1, shared, "zqaaaa", Some("zqaaaa")));
        ledger.record(descriptor(r2, other, "true", None));
        ledger.record(descriptor(r3, shared, "zqbbbb", Some("zqbbbb")));

        assert_eq!(ledger.len(), 3);
        assert_eq!(ledger.by_rule(r2).map(|d| d.value.as_str()), Some("true"));
        let values: Vec<_> = ledger.by_object(shared).map(|d| d.rule).collect();
        assert_eq!(values, vec![r1, r3]);
        assert_eq!(ledger.by_object(SchemaObjectId::new()).count(), 0);
        assert_eq!(ledger.tracked().count(), 2);
    }

    #[test]
    fn test_find_in_text() {
        let mut rng = ChaCha20Rng::seed_from_u64(1);
        let object = SchemaObjectId::new();
        let mut ledger = ValueLedger::new();
        ledger.record(descriptor(RuleId::random(&mut rng), object, "zqaaaa", Some("zqaaaa")));
        ledger.record(descriptor(RuleId::random(&mut rng), object, "<b>zqbbbb</b>", Some("zqbbbb")));

        let found: Vec<_> = ledger.find_in("class zqbbbb active").map(|d| d.value.as_str()).collect();
        assert_eq!(found, vec!["<b>zqbbbb</b>"]);
        assert_eq!(ledger.find_in("unrelated").count(), 0);
    }
}
