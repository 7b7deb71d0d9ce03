use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use uuid::Uuid;

/// Placeholder for free-text fields that do not apply to a problem's category.
pub const NOT_APPLICABLE: &str = "N/A";

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum RoundCategory {
    Dsa,
    MachineCoding,
    SystemDesign,
    TheoryAndDebugging,
}

impl RoundCategory {
    pub const ALL: [RoundCategory; 4] = [
        RoundCategory::Dsa,
        RoundCategory::MachineCoding,
        RoundCategory::SystemDesign,
        RoundCategory::TheoryAndDebugging,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            RoundCategory::Dsa => "dsa",
            RoundCategory::MachineCoding => "machine_coding",
            RoundCategory::SystemDesign => "system_design",
            RoundCategory::TheoryAndDebugging => "theory_and_debugging",
        }
    }
}

impl fmt::Display for RoundCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for RoundCategory {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        RoundCategory::ALL
            .into_iter()
            .find(|c| c.as_str() == s.trim())
            .ok_or_else(|| format!("unknown category '{s}'"))
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum Difficulty {
    Easy,
    Medium,
    Hard,
}

impl Difficulty {
    pub fn as_str(&self) -> &'static str {
        match self {
            Difficulty::Easy => "easy",
            Difficulty::Medium => "medium",
            Difficulty::Hard => "hard",
        }
    }
}

impl fmt::Display for Difficulty {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Difficulty {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "easy" => Ok(Difficulty::Easy),
            "medium" => Ok(Difficulty::Medium),
            "hard" => Ok(Difficulty::Hard),
            other => Err(format!("unknown difficulty '{other}'")),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct DsaExample {
    #[serde(default)]
    pub input: String,
    #[serde(default)]
    pub output: String,
    #[serde(default)]
    pub explanation: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct DsaContent {
    pub problem_statement: String,
    pub constraints: Vec<String>,
    pub examples: Vec<DsaExample>,
    pub hints: Vec<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct MachineCodingContent {
    pub requirements: Vec<String>,
    pub acceptance_criteria: Vec<String>,
    pub technologies: Vec<String>,
    pub evaluation_criteria: Vec<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct SystemDesignContent {
    pub functional_requirements: Vec<String>,
    pub non_functional_requirements: Vec<String>,
    /// Free-form scale targets, e.g. `{"daily_active_users": "10M"}`.
    pub scale: Value,
    pub expected_deliverables: Vec<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct TheoryContent {
    pub question: String,
    pub expected_answer: String,
    pub key_points: Vec<String>,
    pub code_snippet: Option<String>,
}

/// Category-specific problem body. The tag mirrors `Problem::category`.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(tag = "category", rename_all = "snake_case")]
pub enum ProblemContent {
    Dsa(DsaContent),
    MachineCoding(MachineCodingContent),
    SystemDesign(SystemDesignContent),
    TheoryAndDebugging(TheoryContent),
}

impl ProblemContent {
    pub fn category(&self) -> RoundCategory {
        match self {
            ProblemContent::Dsa(_) => RoundCategory::Dsa,
            ProblemContent::MachineCoding(_) => RoundCategory::MachineCoding,
            ProblemContent::SystemDesign(_) => RoundCategory::SystemDesign,
            ProblemContent::TheoryAndDebugging(_) => RoundCategory::TheoryAndDebugging,
        }
    }
}

/// A validated, persisted interview problem.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Problem {
    /// Slot id, `round_{i}_problem_{j}`.
    pub id: String,
    pub simulation_id: Uuid,
    pub user_id: Uuid,
    pub slot: u32,
    pub category: RoundCategory,
    pub title: String,
    pub description: String,
    pub difficulty: Difficulty,
    /// Minutes.
    pub estimated_time: u32,
    pub input_format: String,
    pub output_format: String,
    pub content: ProblemContent,
    pub round_name: String,
    pub round_type: RoundCategory,
    pub created_at: DateTime<Utc>,
}

impl Problem {
    /// Store key. Slot ids repeat across simulations, so the key is scoped.
    pub fn storage_key(&self) -> String {
        problem_storage_key(self.simulation_id, self.user_id, &self.id)
    }
}

pub fn problem_storage_key(simulation_id: Uuid, user_id: Uuid, slot_id: &str) -> String {
    format!("{simulation_id}:{user_id}:{slot_id}")
}

pub fn slot_id(round_index: usize, slot: u32) -> String {
    format!("round_{round_index}_problem_{slot}")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_category_round_trips_through_str() {
        for category in RoundCategory::ALL {
            assert_eq!(category.as_str().parse::<RoundCategory>(), Ok(category));
        }
        assert!("frontend".parse::<RoundCategory>().is_err());
    }

    #[test]
    fn test_category_serializes_snake_case() {
        let json = serde_json::to_value(RoundCategory::TheoryAndDebugging).unwrap();
        assert_eq!(json, "theory_and_debugging");
    }

    #[test]
    fn test_difficulty_parse_is_case_insensitive() {
        assert_eq!("Hard".parse::<Difficulty>(), Ok(Difficulty::Hard));
        assert_eq!(" medium ".parse::<Difficulty>(), Ok(Difficulty::Medium));
        assert!("expert".parse::<Difficulty>().is_err());
    }

    #[test]
    fn test_content_tag_matches_category() {
        let content = ProblemContent::TheoryAndDebugging(TheoryContent {
            question: "What is a vtable?".to_string(),
            expected_answer: String::new(),
            key_points: vec![],
            code_snippet: None,
        });
        let json = serde_json::to_value(&content).unwrap();
        assert_eq!(json["category"], "theory_and_debugging");
        assert_eq!(content.category(), RoundCategory::TheoryAndDebugging);
    }

    #[test]
    fn test_slot_id_format() {
        assert_eq!(slot_id(2, 0), "round_2_problem_0");
    }
}
