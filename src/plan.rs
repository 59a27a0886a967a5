//! Plan model: typed steps decoded from the planner's YAML document.

use crate::error::CoderError;
use serde::{Deserialize, Serialize};
use std::fmt;

mod decomposer;
mod document;

pub use decomposer::PlanDecomposer;
pub use document::{ObjectDocument, PlanDocument, StepDocument};

/// Whether a step needs code execution.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StepKind {
    SqlCode,
    Documentation,
}

impl StepKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            StepKind::SqlCode => "sql_code",
            StepKind::Documentation => "documentation",
        }
    }
}

impl fmt::Display for StepKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Kind of warehouse object a step creates or modifies.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum ObjectType {
    Table,
    View,
    Procedure,
    Function,
    Task,
    Stream,
    Schema,
    Database,
    Warehouse,
    Role,
    Other(String),
}

impl ObjectType {
    /// Case-insensitive; unknown names are kept verbatim as `Other`.
    pub fn parse(raw: &str) -> Self {
        let trimmed = raw.trim();
        let normalized = trimmed.to_ascii_lowercase().replace(['_', '-'], " ");
        match normalized.as_str() {
            "table" => ObjectType::Table,
            "view" | "materialized view" => ObjectType::View,
            "procedure" | "stored procedure" | "sproc" => ObjectType::Procedure,
            "function" | "udf" | "user defined function" => ObjectType::Function,
            "task" => ObjectType::Task,
            "stream" => ObjectType::Stream,
            "schema" => ObjectType::Schema,
            "database" => ObjectType::Database,
            "warehouse" => ObjectType::Warehouse,
            "role" => ObjectType::Role,
            _ => ObjectType::Other(trimmed.to_string()),
        }
    }
}

impl fmt::Display for ObjectType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            ObjectType::Table => "table",
            ObjectType::View => "view",
            ObjectType::Procedure => "procedure",
            ObjectType::Function => "function",
            ObjectType::Task => "task",
            ObjectType::Stream => "stream",
            ObjectType::Schema => "schema",
            ObjectType::Database => "database",
            ObjectType::Warehouse => "warehouse",
            ObjectType::Role => "role",
            ObjectType::Other(other) => other,
        };
        f.write_str(name)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TargetObject {
    pub name: String,
    pub object_type: ObjectType,
}

/// One unit of a plan. Fields are fixed at decode time.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Step {
    name: String,
    kind: StepKind,
    description: String,
    objective: String,
    context: String,
    target_object: TargetObject,
}

impl Step {
    pub fn new(
        name: impl Into<String>,
        kind: StepKind,
        description: impl Into<String>,
        objective: impl Into<String>,
        context: impl Into<String>,
        target_object: TargetObject,
    ) -> Result<Self, CoderError> {
        let name = name.into();
        if name.trim().is_empty() {
            return Err(CoderError::PlanParse("Step name cannot be empty".to_string()));
        }
        Ok(Self {
            name,
            kind,
            description: description.into(),
            objective: objective.into(),
            context: context.into(),
            target_object,
        })
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn kind(&self) -> StepKind {
        self.kind
    }

    pub fn description(&self) -> &str {
        &self.description
    }

    pub fn objective(&self) -> &str {
        &self.objective
    }

    pub fn context(&self) -> &str {
        &self.context
    }

    pub fn target_object(&self) -> &TargetObject {
        &self.target_object
    }

    pub fn is_executable(&self) -> bool {
        self.kind == StepKind::SqlCode
    }

    /// Self-contained task description used as the seed of code generation.
    pub fn task_text(&self) -> String {
        format!(
            "Step: {}\nDescription: {}\nObjective: {}\nObject: {} ({})\nContext: {}",
            self.name,
            self.description,
            self.objective,
            self.target_object.name,
            self.target_object.object_type,
            self.context
        )
    }
}

/// Ordered, immutable sequence of steps. Insertion order is execution order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Plan {
    steps: Vec<Step>,
}

impl Plan {
    pub fn new(steps: Vec<Step>) -> Result<Self, CoderError> {
        if steps.is_empty() {
            return Err(CoderError::PlanParse(
                "Plan must contain at least one step".to_string(),
            ));
        }
        Ok(Self { steps })
    }

    /// Strict decode of a planner response; code fences around the document
    /// are tolerated, anything else outside the YAML is not.
    pub fn from_yaml(raw: &str) -> Result<Self, CoderError> {
        PlanDocument::parse(raw)?.into_plan()
    }

    pub fn to_yaml(&self) -> Result<String, CoderError> {
        PlanDocument::from_plan(self).render()
    }

    pub fn steps(&self) -> &[Step] {
        &self.steps
    }

    pub fn len(&self) -> usize {
        self.steps.len()
    }

    pub fn is_empty(&self) -> bool {
        self.steps.is_empty()
    }

    pub fn code_step_count(&self) -> usize {
        self.steps.iter().filter(|s| s.is_executable()).count()
    }
}
