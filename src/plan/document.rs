//! Wire shape of the plan document exchanged with the planner model.

use super::{ObjectType, Plan, Step, StepKind, TargetObject};
use crate::completion::strip_code_fences;
use crate::error::CoderError;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PlanDocument {
    pub steps: Vec<StepDocument>,
}

/// Every key is required; a missing key fails the decode instead of taking a
/// default.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StepDocument {
    pub step_name: String,
    pub step_type: StepKind,
    pub long_step_description: String,
    pub objective: String,
    pub context: String,
    pub object: ObjectDocument,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ObjectDocument {
    pub name: String,
    #[serde(rename = "type")]
    pub object_type: String,
}

impl PlanDocument {
    pub fn parse(raw: &str) -> Result<Self, CoderError> {
        let body = strip_code_fences(raw);
        if body.is_empty() {
            return Err(CoderError::PlanParse("Planner returned an empty document".to_string()));
        }
        serde_yaml::from_str(&body)
            .map_err(|e| CoderError::PlanParse(format!("Invalid plan document: {}", e)))
    }

    pub fn render(&self) -> Result<String, CoderError> {
        serde_yaml::to_string(self)
            .map_err(|e| CoderError::PlanParse(format!("Failed to render plan: {}", e)))
    }

    pub fn from_plan(plan: &Plan) -> Self {
        Self {
            steps: plan
                .steps()
                .iter()
                .map(|step| StepDocument {
                    step_name: step.name().to_string(),
                    step_type: step.kind(),
                    long_step_description: step.description().to_string(),
                    objective: step.objective().to_string(),
                    context: step.context().to_string(),
                    object: ObjectDocument {
                        name: step.target_object().name.clone(),
                        object_type: step.target_object().object_type.to_string(),
                    },
                })
                .collect(),
        }
    }

    pub fn into_plan(self) -> Result<Plan, CoderError> {
        let steps = self
            .steps
            .into_iter()
            .enumerate()
            .map(|(index, doc)| {
                Step::new(
                    doc.step_name,
                    doc.step_type,
                    doc.long_step_description,
                    doc.objective,
                    doc.context,
                    TargetObject {
                        name: doc.object.name,
                        object_type: ObjectType::parse(&doc.object.object_type),
                    },
                )
                .map_err(|e| CoderError::PlanParse(format!("Step {}: {}", index + 1, e)))
            })
            .collect::<Result<Vec<_>, _>>()?;
        Plan::new(steps)
    }
}
