//! Maps a validated candidate onto the typed `Problem` record.
//!
//! Missing collections default to empty, missing applicable text to "", and
//! text fields that do not apply to the category to "N/A".

use chrono::{DateTime, Utc};
use serde_json::{Map, Value};
use uuid::Uuid;

use crate::models::problem::{
    Difficulty, DsaContent, DsaExample, MachineCodingContent, Problem, ProblemContent,
    RoundCategory, SystemDesignContent, TheoryContent, NOT_APPLICABLE,
};
use crate::simulation::generator::SlotCandidate;

/// Round-level facts stamped onto every problem in a batch.
#[derive(Debug, Clone)]
pub struct RoundMetadata {
    pub simulation_id: Uuid,
    pub round_name: String,
    pub round_type: RoundCategory,
    pub duration_minutes: u32,
}

fn text(content: &Map<String, Value>, key: &str) -> String {
    content
        .get(key)
        .and_then(Value::as_str)
        .map(str::to_string)
        .unwrap_or_default()
}

fn text_or_na(content: &Map<String, Value>, key: &str) -> String {
    content
        .get(key)
        .and_then(Value::as_str)
        .filter(|s| !s.trim().is_empty())
        .unwrap_or(NOT_APPLICABLE)
        .to_string()
}

fn string_list(content: &Map<String, Value>, key: &str) -> Vec<String> {
    content
        .get(key)
        .and_then(Value::as_array)
        .map(|items| {
            items
                .iter()
                .filter_map(|v| match v {
                    Value::String(s) => Some(s.clone()),
                    Value::Null => None,
                    other => Some(other.to_string()),
                })
                .collect()
        })
        .unwrap_or_default()
}

fn examples(content: &Map<String, Value>) -> Vec<DsaExample> {
    content
        .get("examples")
        .and_then(Value::as_array)
        .map(|items| {
            items
                .iter()
                .filter_map(|v| serde_json::from_value(v.clone()).ok())
                .collect()
        })
        .unwrap_or_default()
}

pub fn transform_content(category: RoundCategory, content: &Map<String, Value>) -> ProblemContent {
    match category {
        RoundCategory::Dsa => ProblemContent::Dsa(DsaContent {
            problem_statement: text(content, "problem_statement"),
            constraints: string_list(content, "constraints"),
            examples: examples(content),
            hints: string_list(content, "hints"),
        }),
        RoundCategory::MachineCoding => ProblemContent::MachineCoding(MachineCodingContent {
            requirements: string_list(content, "requirements"),
            acceptance_criteria: string_list(content, "acceptance_criteria"),
            technologies: string_list(content, "technologies"),
            evaluation_criteria: string_list(content, "evaluation_criteria"),
        }),
        RoundCategory::SystemDesign => ProblemContent::SystemDesign(SystemDesignContent {
            functional_requirements: string_list(content, "functional_requirements"),
            non_functional_requirements: string_list(content, "non_functional_requirements"),
            scale: content
                .get("scale")
                .filter(|v| v.is_object())
                .cloned()
                .unwrap_or_else(|| Value::Object(Map::new())),
            expected_deliverables: string_list(content, "expected_deliverables"),
        }),
        RoundCategory::TheoryAndDebugging => ProblemContent::TheoryAndDebugging(TheoryContent {
            question: text(content, "question"),
            expected_answer: text(content, "expected_answer"),
            key_points: string_list(content, "key_points"),
            code_snippet: content
                .get("code_snippet")
                .and_then(Value::as_str)
                .filter(|s| !s.trim().is_empty())
                .map(str::to_string),
        }),
    }
}

/// Builds the persistence record. `category` is the validated category of the
/// candidate; `estimated_time` is the slice the planner allotted to this slot.
pub fn transform(
    slot: &SlotCandidate,
    category: RoundCategory,
    user_id: Uuid,
    estimated_time: u32,
    metadata: &RoundMetadata,
    now: DateTime<Utc>,
) -> Problem {
    let candidate = &slot.candidate;
    let (input_format, output_format) = match category {
        RoundCategory::Dsa => (
            text_or_na(&candidate.content, "input_format"),
            text_or_na(&candidate.content, "output_format"),
        ),
        _ => (NOT_APPLICABLE.to_string(), NOT_APPLICABLE.to_string()),
    };

    let content = transform_content(category, &candidate.content);
    debug_assert_eq!(content.category(), category);

    Problem {
        id: slot.id.clone(),
        simulation_id: metadata.simulation_id,
        user_id,
        slot: slot.slot,
        category,
        title: candidate.title.trim().to_string(),
        description: candidate.description.trim().to_string(),
        difficulty: candidate.difficulty.parse().unwrap_or(Difficulty::Medium),
        estimated_time,
        input_format,
        output_format,
        content,
        round_name: metadata.round_name.clone(),
        round_type: metadata.round_type,
        created_at: now,
    }
}
