//! Checks for test cases whose stored shape changes what an export shows.

use crate::model::TestCase;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum DiagnosticLevel {
    Error,
    Warning,
}

/// A finding located as `case <id>` or `case <id> > step <number>`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Diagnostic {
    pub level: DiagnosticLevel,
    pub location: String,
    pub message: String,
}

impl DiagnosticLevel {
    pub fn as_str(&self) -> &'static str {
        match self {
            DiagnosticLevel::Error => "error",
            DiagnosticLevel::Warning => "warning",
        }
    }
}

impl Diagnostic {
    pub fn is_error(&self) -> bool {
        self.level == DiagnosticLevel::Error
    }
}

pub fn validate_case(case: &TestCase) -> Vec<Diagnostic> {
    let mut diagnostics = Vec::new();
    check_case(case, &mut diagnostics);
    diagnostics
}

pub fn validate_suite<'a, I>(cases: I) -> Vec<Diagnostic>
where
    I: IntoIterator<Item = &'a TestCase>,
{
    let mut diagnostics = Vec::new();
    for case in cases {
        check_case(case, &mut diagnostics);
    }
    diagnostics
}

fn check_case(case: &TestCase, diagnostics: &mut Vec<Diagnostic>) {
    let case_at = format!("case {}", case.id);
    let mut report = |level: DiagnosticLevel, location: String, message: String| {
        diagnostics.push(Diagnostic {
            level,
            location,
            message,
        });
    };

    if case.title.trim().is_empty() {
        report(
            DiagnosticLevel::Error,
            case_at.clone(),
            "title is required".to_string(),
        );
    }

    let mut uses: BTreeMap<i64, usize> = BTreeMap::new();
    for step in &case.test_steps {
        *uses.entry(step.step_number).or_default() += 1;

        let step_at = format!("{case_at} > step {}", step.step_number);
        if step.step_number == 0 {
            report(
                DiagnosticLevel::Warning,
                step_at.clone(),
                "step number 0 is skipped by exports".to_string(),
            );
        } else if step.step_number < 0 {
            report(
                DiagnosticLevel::Warning,
                step_at.clone(),
                "step numbers should be positive".to_string(),
            );
        }
        if step.step_action.trim().is_empty() {
            report(
                DiagnosticLevel::Warning,
                step_at,
                "step has no action".to_string(),
            );
        }
    }

    for (number, count) in uses.into_iter().filter(|(_, count)| *count > 1) {
        report(
            DiagnosticLevel::Warning,
            case_at.clone(),
            format!("step number {number} is used by {count} steps; all of them are exported"),
        );
    }
}
