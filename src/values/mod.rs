//! Value generation and taint tracking
//!
//! The [`ValueGenerator`] turns the scalar rules of a plan into concrete
//! values. Strings carry a [`TaintMarker`] prefix so that the analyzer can
//! recognise them in the transformed output, and every produced value is
//! recorded as a [`ValueDescriptor`] in the plan execution's [`ValueLedger`].

mod descriptor;
mod generator;
mod marker;

pub use descriptor::{ValueDescriptor, ValueLedger};
pub use generator::{is_well_formed_fragment, ValueConfig, ValueGenerator};
pub use marker::{LiteralScanPrefixSelector, PrefixSelector, TaintMarker};
