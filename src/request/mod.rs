//! Generation plans
//!
//! A [`Request`] is a tree of generation rules describing the shape of one
//! synthetic input document: which elements to emit, which attributes they
//! carry and where character data or raw markup goes. It says nothing about
//! the scalar values themselves except for an optional pinned
//! [`RequestedValue`], which only confirmation runs use.
//!
//! Plans are created by the [`RequestGenerator`] and are immutable once
//! built. A confirmation plan is derived with [`Request::modify`], which
//! changes exactly one rule's requested value.

mod generator;
mod plan;
mod rules;

pub use generator::{GeneratorConfig, RequestGenerator, RootSelector, UniformRootSelector};
pub use plan::Request;
pub use rules::{
    AddDataContentRule, AddElementRule, AddElementRuleBuilder, AddRawContentRule, ContentRule,
    ExtensionFunctionRule, GenerationRule, RawContentMode, RequestedValue, RuleId,
    SetAttributeRule, StylesheetParameterRule, ValueRule,
};
