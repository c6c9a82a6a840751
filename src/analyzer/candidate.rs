//! Modification requests and the confirmation state machine

use serde::{Deserialize, Serialize};
use std::fmt;

use super::path::NodePath;
use crate::error::{Result, StateError};
use crate::request::{Request, RuleId};
use crate::schema::SchemaObjectId;

/// Everything a rule needs to verify its own detection later
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Payload {
    /// Schema object whose value is replaced
    pub schema_object: SchemaObjectId,
    /// Element the detection was made on (the owner of an attribute, the
    /// parent of a text or data node)
    pub path: NodePath,
    /// Attribute the detection was made on, for attribute rules
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub attribute: Option<String>,
    /// Identifying string the verification looks for
    pub marker: String,
    /// Replacement value for the confirmation run
    pub replacement: String,
    /// Original value of the replaced rule
    pub input_sample: String,
    /// Output excerpt of the detection
    pub output_sample: String,
    /// Attribute names of the element at detection time
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub baseline_attributes: Vec<String>,
}

/// Proposed single-value substitution
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ModificationRequest {
    /// Analyzer rule that proposed it
    pub analyzer_rule: String,
    /// Generation rule whose value is replaced
    pub generation_rule: RuleId,
    /// Rule specific payload
    pub payload: Payload,
}

impl ModificationRequest {
    /// Derive the confirmation plan from the plan the detection was made on
    pub fn apply(&self, original: &Request) -> Result<Request> {
        original.modify(
            self.generation_rule,
            self.payload.schema_object,
            self.payload.replacement.as_str(),
        )
    }
}

/// Outcome of a rule's verify phase
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Verification {
    /// The injection reached the predicted position
    Confirmed {
        /// Excerpt of the confirmation output
        output_sample: String,
    },
    /// It did not
    Refuted {
        /// Why
        reason: String,
    },
}

impl Verification {
    /// Refutation with a reason
    pub fn refuted(reason: impl Into<String>) -> Self {
        Verification::Refuted {
            reason: reason.into(),
        }
    }

    /// Whether the injection was confirmed
    pub fn is_confirmed(&self) -> bool {
        matches!(self, Verification::Confirmed { .. })
    }
}

/// Confirmation state of a detection
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum CandidateState {
    /// Proposed by a rule
    Detected,
    /// Confirmation plan built, waiting for its transform
    AwaitingConfirmationTransform,
    /// Verified
    Confirmed,
    /// Not verified, or the confirmation run failed
    Refuted,
}

impl CandidateState {
    /// Whether no further transition is possible
    pub fn is_terminal(&self) -> bool {
        matches!(self, CandidateState::Confirmed | CandidateState::Refuted)
    }

    fn can_become(&self, next: CandidateState) -> bool {
        use CandidateState::*;
        matches!(
            (self, next),
            (Detected, AwaitingConfirmationTransform)
                | (AwaitingConfirmationTransform, Confirmed)
                | (AwaitingConfirmationTransform, Refuted)
        )
    }
}

impl fmt::Display for CandidateState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            CandidateState::Detected => "detected",
            CandidateState::AwaitingConfirmationTransform => "awaiting confirmation transform",
            CandidateState::Confirmed => "confirmed",
            CandidateState::Refuted => "refuted",
        };
        f.write_str(name)
    }
}

/// Confirmed finding handed to the report sink
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct VulnerabilityCandidate {
    /// Analyzer rule ID
    pub rule_id: String,
    /// Affected schema object
    pub schema_object: SchemaObjectId,
    /// Structural path of the affected node
    pub path: NodePath,
    /// Injected value
    pub input_sample: String,
    /// Output excerpt of the original run
    pub original_sample: String,
    /// Output excerpt of the confirmation run
    pub output_sample: String,
}

/// One detection moving through the confirmation cycle
#[derive(Debug, Clone)]
pub struct Candidate {
    request: ModificationRequest,
    state: CandidateState,
}

impl Candidate {
    /// Start tracking a detection
    pub fn new(request: ModificationRequest) -> Self {
        Self {
            request,
            state: CandidateState::Detected,
        }
    }

    /// Current state
    pub fn state(&self) -> CandidateState {
        self.state
    }

    /// The modification request
    pub fn request(&self) -> &ModificationRequest {
        &self.request
    }

    fn transition(&mut self, next: CandidateState) -> Result<()> {
        if !self.state.can_become(next) {
            return Err(StateError::new(format!(
                "Candidate of rule {} cannot go from {} to {}",
                self.request.analyzer_rule, self.state, next
            ))
            .with_rule(self.request.generation_rule)
            .with_schema_object(self.request.payload.schema_object)
            .into());
        }
        self.state = next;
        Ok(())
    }

    /// Build the confirmation plan and wait for its transform
    pub fn begin_confirmation(&mut self, original: &Request) -> Result<Request> {
        let confirmation = self.request.apply(original)?;
        self.transition(CandidateState::AwaitingConfirmationTransform)?;
        Ok(confirmation)
    }

    /// Record the verify result. A confirmed candidate yields the finding.
    pub fn resolve(&mut self, verification: Verification) -> Result<Option<VulnerabilityCandidate>> {
        match verification {
            Verification::Confirmed { output_sample } => {
                self.transition(CandidateState::Confirmed)?;
                let payload = &self.request.payload;
                Ok(Some(VulnerabilityCandidate {
                    rule_id: self.request.analyzer_rule.clone(),
                    schema_object: payload.schema_object,
                    path: payload.path.clone(),
                    input_sample: payload.replacement.clone(),
                    original_sample: payload.output_sample.clone(),
                    output_sample,
                }))
            }
            Verification::Refuted { .. } => {
                self.transition(CandidateState::Refuted)?;
                Ok(None)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::Error;

    fn request() -> ModificationRequest {
        ModificationRequest {
            analyzer_rule: "A.1".to_string(),
            generation_rule: RuleId::nil(),
            payload: Payload {
                schema_object: SchemaObjectId::nil(),
                path: NodePath::root().child(0),
                attribute: Some("zqabc".to_string()),
                marker: "style".to_string(),
                replacement: "style".to_string(),
                input_sample: "zqabc".to_string(),
                output_sample: "zqabc=\"zqabc\"".to_string(),
                baseline_attributes: vec!["zqabc".to_string()],
            },
        }
    }

    #[test]
    fn test_confirmed_cycle() {
        let mut candidate = Candidate::new(request());
        candidate.transition(CandidateState::AwaitingConfirmationTransform).unwrap();
        let finding = candidate
            .resolve(Verification::Confirmed {
                output_sample: "style=\"style\"".to_string(),
            })
            .unwrap()
            .unwrap();
        assert_eq!(candidate.state(), CandidateState::Confirmed);
        assert_eq!(finding.rule_id, "A.1");
        assert_eq!(finding.input_sample, "style");
        assert!(candidate.state().is_terminal());
    }

    #[test]
    fn test_refuted_cycle() {
        let mut candidate = Candidate::new(request());
        candidate.transition(CandidateState::AwaitingConfirmationTransform).unwrap();
        assert!(candidate.resolve(Verification::refuted("no style attribute")).unwrap().is_none());
        assert_eq!(candidate.state(), CandidateState::Refuted);
    }

    #[test]
    fn test_illegal_transitions() {
        let mut candidate = Candidate::new(request());
        let result = candidate.resolve(Verification::refuted("too early"));
        assert!(matches!(result, Err(Error::IllegalState(_))));
        assert_eq!(candidate.state(), CandidateState::Detected);

        candidate.transition(CandidateState::AwaitingConfirmationTransform).unwrap();
        candidate.resolve(Verification::refuted("x")).unwrap();
        assert!(candidate.transition(CandidateState::Confirmed).is_err());
        assert!(candidate.transition(CandidateState::AwaitingConfirmationTransform).is_err());
    }

    #[test]
    fn test_request_round_trip() {
        let request = request();
        let json = serde_json::to_string(&request).unwrap();
        let restored: ModificationRequest = serde_json::from_str(&json).unwrap();
        assert_eq!(restored, request);
    }
}
