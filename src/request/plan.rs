//! The generation plan of one test case

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};

use super::rules::{
    AddElementRule, ExtensionFunctionRule, GenerationRule, RequestedValue, RuleId,
    StylesheetParameterRule, ValueRule,
};
use crate::error::{Error, Result, StateError};
use crate::schema::SchemaObjectId;

/// Rule tree for one synthetic document plus its global rules
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Request {
    stylesheet_uri: String,
    schema_version: u32,
    value_seed: u64,
    root: AddElementRule,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    extension_functions: Vec<ExtensionFunctionRule>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    stylesheet_parameters: Vec<StylesheetParameterRule>,
    #[serde(default, skip_serializing_if = "IndexMap::is_empty")]
    requested_values: IndexMap<SchemaObjectId, RequestedValue>,
}

impl Request {
    /// Assemble a request
    pub fn new(
        stylesheet_uri: impl Into<String>,
        schema_version: u32,
        value_seed: u64,
        root: AddElementRule,
        extension_functions: Vec<ExtensionFunctionRule>,
        stylesheet_parameters: Vec<StylesheetParameterRule>,
    ) -> Self {
        Self {
            stylesheet_uri: stylesheet_uri.into(),
            schema_version,
            value_seed,
            root,
            extension_functions,
            stylesheet_parameters,
            requested_values: IndexMap::new(),
        }
    }

    /// Load the persisted form
    pub fn from_json(json: &str) -> Result<Self> {
        Ok(serde_json::from_str(json)?)
    }

    /// Write the persisted form
    pub fn to_json(&self) -> Result<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }

    /// Stylesheet the plan was generated for
    pub fn stylesheet_uri(&self) -> &str {
        &self.stylesheet_uri
    }

    /// Version of the schema the plan was generated from
    pub fn schema_version(&self) -> u32 {
        self.schema_version
    }

    /// Seed the value generator derives per-rule randomness from
    pub fn value_seed(&self) -> u64 {
        self.value_seed
    }

    /// Root element rule
    pub fn root(&self) -> &AddElementRule {
        &self.root
    }

    /// Extension function rules
    pub fn extension_functions(&self) -> &[ExtensionFunctionRule] {
        &self.extension_functions
    }

    /// Stylesheet parameter rules
    pub fn stylesheet_parameters(&self) -> &[StylesheetParameterRule] {
        &self.stylesheet_parameters
    }

    /// Requested value pinned for a schema object
    pub fn requested_value_for_object(&self, id: SchemaObjectId) -> Option<&RequestedValue> {
        self.requested_values.get(&id)
    }

    /// Requested value pinned on a rule
    pub fn requested_value_for_rule(&self, rule_id: RuleId) -> Option<&RequestedValue> {
        let mut found = None;
        self.for_each_value_rule(&mut |rule| {
            if rule.id() == rule_id {
                found = rule.requested_value();
            }
        });
        found
    }

    /// Visit every value-bearing rule: the document tree first, then
    /// extension functions, then stylesheet parameters
    pub fn for_each_value_rule<'a>(&'a self, f: &mut dyn FnMut(&'a dyn ValueRule)) {
        self.root.for_each_value_rule(f);
        for rule in &self.extension_functions {
            f(rule);
        }
        for rule in &self.stylesheet_parameters {
            f(rule);
        }
    }

    /// Number of value-bearing rules
    pub fn value_rule_count(&self) -> usize {
        let mut count = 0;
        self.for_each_value_rule(&mut |_| count += 1);
        count
    }

    /// Number of element rules
    pub fn element_count(&self) -> usize {
        self.root.element_count()
    }

    /// Derive a confirmation request: an identical copy except that the rule
    /// `rule_id` carries `value` as its requested value, which is also indexed
    /// under `object_id`
    pub fn modify(
        &self,
        rule_id: RuleId,
        object_id: SchemaObjectId,
        value: impl Into<String>,
    ) -> Result<Request> {
        let mut target = None;
        self.for_each_value_rule(&mut |rule| {
            if rule.id() == rule_id {
                target = Some(rule.target());
            }
        });

        let target = match target {
            Some(target) => target,
            None if self.root.contains_rule(rule_id) => {
                return Err(StateError::new("Element rules carry no value")
                    .with_rule(rule_id)
                    .with_schema_object(object_id)
                    .into())
            }
            None => return Err(Error::UnknownRule(rule_id)),
        };
        if target != object_id {
            return Err(StateError::new(format!("Rule targets schema object {}", target))
                .with_rule(rule_id)
                .with_schema_object(object_id)
                .into());
        }

        let value = RequestedValue::new(value);
        let mut modified = self.clone();
        let found = modified.root.set_requested_value(rule_id, &value)
            || set_in(&mut modified.extension_functions, rule_id, &value, |r, v| {
                r.set_requested_value(v)
            })
            || set_in(&mut modified.stylesheet_parameters, rule_id, &value, |r, v| {
                r.set_requested_value(v)
            });
        debug_assert!(found);

        modified.requested_values.insert(object_id, value);
        Ok(modified)
    }

    /// Copy with every rule ID reset to nil, for structural comparison
    pub fn normalize(&self) -> Request {
        Request {
            stylesheet_uri: self.stylesheet_uri.clone(),
            schema_version: self.schema_version,
            value_seed: self.value_seed,
            root: self.root.normalize(),
            extension_functions: self.extension_functions.iter().map(|r| r.normalize()).collect(),
            stylesheet_parameters: self
                .stylesheet_parameters
                .iter()
                .map(|r| r.normalize())
                .collect(),
            requested_values: self.requested_values.clone(),
        }
    }
}

fn set_in<T: GenerationRule>(
    rules: &mut [T],
    rule_id: RuleId,
    value: &RequestedValue,
    set: impl Fn(&mut T, RequestedValue),
) -> bool {
    match rules.iter_mut().find(|r| r.id() == rule_id) {
        Some(rule) => {
            set(rule, value.clone());
            true
        }
        None => false,
    }
}
