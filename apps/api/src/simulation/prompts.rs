use crate::models::problem::RoundCategory;

pub const PROBLEM_GENERATION_PROMPT_TEMPLATE: &str = r#"
Write ONE interview problem for a {role_level} candidate interviewing at {company_name}.

Round category: {category}
Difficulty: {difficulty}

Return a JSON object with exactly these top-level keys:
{
  "title": string,
  "description": string,
  "difficulty": "{difficulty}",
  "category": "{category}",
  "content": {content_schema}
}

Match the style of problems {company_name} is known to ask. Keep the problem
self-contained and solvable within a single interview slot.
"#;

const DSA_SCHEMA: &str = r#"{
    "problem_statement": string,
    "input_format": string,
    "output_format": string,
    "constraints": [string],
    "examples": [{"input": string, "output": string, "explanation": string}],
    "hints": [string]
  }"#;

const MACHINE_CODING_SCHEMA: &str = r#"{
    "requirements": [string],
    "acceptance_criteria": [string],
    "technologies": [string],
    "evaluation_criteria": [string]
  }"#;

const SYSTEM_DESIGN_SCHEMA: &str = r#"{
    "functional_requirements": [string],
    "non_functional_requirements": [string],
    "scale": {"<metric>": string},
    "expected_deliverables": [string]
  }"#;

const THEORY_SCHEMA: &str = r#"{
    "question": string,
    "expected_answer": string,
    "key_points": [string],
    "code_snippet": string | null
  }"#;

pub fn content_schema(category: RoundCategory) -> &'static str {
    match category {
        RoundCategory::Dsa => DSA_SCHEMA,
        RoundCategory::MachineCoding => MACHINE_CODING_SCHEMA,
        RoundCategory::SystemDesign => SYSTEM_DESIGN_SCHEMA,
        RoundCategory::TheoryAndDebugging => THEORY_SCHEMA,
    }
}
