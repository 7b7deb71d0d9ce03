//! Structural checks on generated candidates.
//!
//! Generation output is variable, so checks are lenient: each category needs
//! only a minimum number of its distinguishing fields. The minimums live in
//! `ValidationPolicy` and can be tuned from config.

use serde_json::{Map, Value};
use thiserror::Error;

use crate::models::problem::{Difficulty, RoundCategory};
use crate::simulation::generator::CandidateProblem;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ValidationPolicy {
    /// Of: requirements, acceptance_criteria, technologies.
    pub min_machine_coding_fields: usize,
    /// Of: functional_requirements, non_functional_requirements, scale, expected_deliverables.
    pub min_system_design_fields: usize,
    /// Of: question, expected_answer, key_points.
    pub min_theory_fields: usize,
}

impl Default for ValidationPolicy {
    fn default() -> Self {
        Self {
            min_machine_coding_fields: 1,
            min_system_design_fields: 2,
            min_theory_fields: 2,
        }
    }
}

#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum ValidationError {
    #[error("missing title")]
    MissingTitle,

    #[error("missing description")]
    MissingDescription,

    #[error("unsupported difficulty '{0}'")]
    UnsupportedDifficulty(String),

    #[error("category mismatch: expected {expected}, got '{found}'")]
    CategoryMismatch {
        expected: RoundCategory,
        found: String,
    },

    #[error("dsa problem has no problem_statement")]
    MissingProblemStatement,

    #[error("{category} problem has {found} of the required {required} detail fields")]
    InsufficientDetail {
        category: RoundCategory,
        found: usize,
        required: usize,
    },
}

pub fn non_empty_str(content: &Map<String, Value>, key: &str) -> bool {
    content
        .get(key)
        .and_then(Value::as_str)
        .is_some_and(|s| !s.trim().is_empty())
}

pub fn non_empty_array(content: &Map<String, Value>, key: &str) -> bool {
    content
        .get(key)
        .and_then(Value::as_array)
        .is_some_and(|a| !a.is_empty())
}

pub fn is_object(content: &Map<String, Value>, key: &str) -> bool {
    content.get(key).is_some_and(Value::is_object)
}

pub fn has_problem_statement(content: &Map<String, Value>) -> bool {
    non_empty_str(content, "problem_statement")
}

pub fn machine_coding_signals(content: &Map<String, Value>) -> usize {
    ["requirements", "acceptance_criteria", "technologies"]
        .iter()
        .filter(|key| non_empty_array(content, key))
        .count()
}

pub fn system_design_signals(content: &Map<String, Value>) -> usize {
    let arrays = [
        "functional_requirements",
        "non_functional_requirements",
        "expected_deliverables",
    ]
    .iter()
    .filter(|key| non_empty_array(content, key))
    .count();
    arrays + usize::from(is_object(content, "scale"))
}

pub fn theory_signals(content: &Map<String, Value>) -> usize {
    usize::from(non_empty_str(content, "question"))
        + usize::from(non_empty_str(content, "expected_answer"))
        + usize::from(non_empty_array(content, "key_points"))
}

fn require(category: RoundCategory, found: usize, required: usize) -> Result<(), ValidationError> {
    if found >= required {
        Ok(())
    } else {
        Err(ValidationError::InsufficientDetail {
            category,
            found,
            required,
        })
    }
}

pub fn validate_common(
    candidate: &CandidateProblem,
    expected: RoundCategory,
) -> Result<(), ValidationError> {
    if candidate.title.trim().is_empty() {
        return Err(ValidationError::MissingTitle);
    }
    if candidate.description.trim().is_empty() {
        return Err(ValidationError::MissingDescription);
    }
    if candidate.difficulty.parse::<Difficulty>().is_err() {
        return Err(ValidationError::UnsupportedDifficulty(
            candidate.difficulty.clone(),
        ));
    }
    if candidate.category.trim() != expected.as_str() {
        return Err(ValidationError::CategoryMismatch {
            expected,
            found: candidate.category.clone(),
        });
    }
    Ok(())
}

/// Full check for a candidate generated for `expected`.
pub fn validate_candidate(
    candidate: &CandidateProblem,
    expected: RoundCategory,
    policy: &ValidationPolicy,
) -> Result<(), ValidationError> {
    validate_common(candidate, expected)?;

    let content = &candidate.content;
    match expected {
        RoundCategory::Dsa => {
            if has_problem_statement(content) {
                Ok(())
            } else {
                Err(ValidationError::MissingProblemStatement)
            }
        }
        RoundCategory::MachineCoding => require(
            expected,
            machine_coding_signals(content),
            policy.min_machine_coding_fields,
        ),
        RoundCategory::SystemDesign => require(
            expected,
            system_design_signals(content),
            policy.min_system_design_fields,
        ),
        RoundCategory::TheoryAndDebugging => {
            require(expected, theory_signals(content), policy.min_theory_fields)
        }
    }
}
