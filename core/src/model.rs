use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use time::OffsetDateTime;

#[derive(Debug, Clone, thiserror::Error, PartialEq, Eq)]
#[error("invalid {kind} '{value}'")]
pub struct ParseEnumError {
    pub kind: &'static str,
    pub value: String,
}

macro_rules! text_enum {
    ($name:ident, $kind:literal, { $($variant:ident => $text:literal),+ $(,)? }) => {
        impl $name {
            pub const ALL: &'static [$name] = &[$($name::$variant),+];

            pub fn as_str(&self) -> &'static str {
                match self {
                    $($name::$variant => $text),+
                }
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str(self.as_str())
            }
        }

        impl FromStr for $name {
            type Err = ParseEnumError;

            fn from_str(value: &str) -> Result<Self, Self::Err> {
                let trimmed = value.trim();
                $name::ALL
                    .iter()
                    .copied()
                    .find(|candidate| candidate.as_str().eq_ignore_ascii_case(trimmed))
                    .ok_or_else(|| ParseEnumError {
                        kind: $kind,
                        value: value.to_string(),
                    })
            }
        }
    };
}

#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq, Hash)]
pub enum Status {
    #[default]
    #[serde(rename = "Not Run")]
    NotRun,
    Passed,
    Failed,
    Blocked,
}

text_enum!(Status, "status", {
    NotRun => "Not Run",
    Passed => "Passed",
    Failed => "Failed",
    Blocked => "Blocked",
});

#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq, Hash)]
pub enum Importance {
    Low,
    #[default]
    Medium,
    High,
}

text_enum!(Importance, "importance", {
    Low => "Low",
    Medium => "Medium",
    High => "High",
});

impl Importance {
    pub fn rank(&self) -> u8 {
        match self {
            Importance::Low => 0,
            Importance::Medium => 1,
            Importance::High => 2,
        }
    }
}

#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq, Hash)]
pub enum ExecutionType {
    #[default]
    Manual,
    Automated,
}

text_enum!(ExecutionType, "execution type", {
    Manual => "Manual",
    Automated => "Automated",
});

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Project {
    pub id: i64,
    pub name: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct TestSuite {
    pub id: i64,
    pub project_id: i64,
    pub parent_suite_id: Option<i64>,
    pub name: String,
}

/// Project and suite metadata carried into the generic XML export.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct SuiteInfo {
    pub project_id: i64,
    pub project_name: String,
    pub test_suite_id: i64,
    pub test_suite_name: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct TestStep {
    pub id: i64,
    pub test_case_id: i64,
    pub step_number: i64,
    pub step_action: String,
    pub expected_result: String,
    pub execution_type: ExecutionType,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct TestCase {
    pub id: i64,
    pub test_suite_id: i64,
    pub user_story_id: Option<i64>,
    pub title: String,
    pub summary: String,
    pub precondition: String,
    pub postcondition: String,
    pub status: Status,
    pub manual_edit: bool,
    pub importance: Importance,
    pub execution_type: ExecutionType,
    #[serde(with = "time::serde::rfc3339")]
    pub created_at: OffsetDateTime,
    #[serde(with = "time::serde::rfc3339")]
    pub updated_at: OffsetDateTime,
    #[serde(default)]
    pub test_steps: Vec<TestStep>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct NewTestCase {
    pub test_suite_id: i64,
    #[serde(default)]
    pub user_story_id: Option<i64>,
    pub title: String,
    #[serde(default)]
    pub summary: String,
    #[serde(default)]
    pub precondition: String,
    #[serde(default)]
    pub postcondition: String,
    #[serde(default)]
    pub status: Status,
    #[serde(default)]
    pub manual_edit: bool,
    #[serde(default)]
    pub importance: Importance,
    #[serde(default)]
    pub execution_type: ExecutionType,
}

/// Full replacement of a test case's editable fields. Omitted fields fall
/// back to their defaults rather than keeping the stored value.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct CaseUpdate {
    pub title: String,
    #[serde(default)]
    pub summary: String,
    #[serde(default)]
    pub precondition: String,
    #[serde(default)]
    pub postcondition: String,
    #[serde(default)]
    pub status: Status,
    #[serde(default)]
    pub manual_edit: bool,
    #[serde(default)]
    pub importance: Importance,
    #[serde(default)]
    pub execution_type: ExecutionType,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct NewTestStep {
    pub test_case_id: i64,
    pub step_number: i64,
    pub step_action: String,
    #[serde(default)]
    pub expected_result: String,
    #[serde(default)]
    pub execution_type: ExecutionType,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct StepUpdate {
    pub step_number: i64,
    pub step_action: String,
    #[serde(default)]
    pub expected_result: String,
    #[serde(default)]
    pub execution_type: ExecutionType,
}
