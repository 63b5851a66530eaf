//! Folds the flat `test_cases LEFT JOIN test_steps` result set into test case
//! records that own their ordered steps.

use crate::model::{ExecutionType, Importance, Status, TestCase, TestStep};
use indexmap::IndexMap;
use time::OffsetDateTime;

/// Test cases keyed by id, iterating in the order ids were first seen.
pub type CaseMap = IndexMap<i64, TestCase>;

/// One row of the joined result set: all test case columns plus the columns
/// of at most one step. Step columns are `None` when the case has no steps.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FlatRow {
    pub case_id: i64,
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
    pub created_at: OffsetDateTime,
    pub updated_at: OffsetDateTime,
    pub step_id: Option<i64>,
    pub step_number: Option<i64>,
    pub step_action: Option<String>,
    pub expected_result: Option<String>,
    pub step_execution_type: Option<ExecutionType>,
}

impl FlatRow {
    fn to_case(&self) -> TestCase {
        TestCase {
            id: self.case_id,
            test_suite_id: self.test_suite_id,
            user_story_id: self.user_story_id,
            title: self.title.clone(),
            summary: self.summary.clone(),
            precondition: self.precondition.clone(),
            postcondition: self.postcondition.clone(),
            status: self.status,
            manual_edit: self.manual_edit,
            importance: self.importance,
            execution_type: self.execution_type,
            created_at: self.created_at,
            updated_at: self.updated_at,
            test_steps: Vec::new(),
        }
    }

    /// The step carried by this row, if any. A step number of zero counts as
    /// "no step", so a zero-numbered step never reaches an export.
    fn to_step(&self) -> Option<TestStep> {
        let step_number = self.step_number.filter(|number| *number != 0)?;
        Some(TestStep {
            id: self.step_id.unwrap_or_default(),
            test_case_id: self.case_id,
            step_number,
            step_action: self.step_action.clone().unwrap_or_default(),
            expected_result: self.expected_result.clone().unwrap_or_default(),
            execution_type: self.step_execution_type.unwrap_or_default(),
        })
    }
}

/// Groups rows into test cases in a single pass.
///
/// Rows must already be ordered by case id and then step number; the input
/// order is kept as-is. Duplicate step numbers are all retained.
pub fn aggregate_rows<I>(rows: I) -> CaseMap
where
    I: IntoIterator<Item = FlatRow>,
{
    let mut cases = CaseMap::new();
    for row in rows {
        let case = cases.entry(row.case_id).or_insert_with(|| row.to_case());
        if let Some(step) = row.to_step() {
            case.test_steps.push(step);
        }
    }
    cases
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;

    pub(crate) fn case_row(case_id: i64, title: &str) -> FlatRow {
        FlatRow {
            case_id,
            test_suite_id: 201,
            user_story_id: None,
            title: title.to_string(),
            summary: format!("summary of {title}"),
            precondition: String::new(),
            postcondition: String::new(),
            status: Status::NotRun,
            manual_edit: false,
            importance: Importance::Medium,
            execution_type: ExecutionType::Manual,
            created_at: OffsetDateTime::UNIX_EPOCH,
            updated_at: OffsetDateTime::UNIX_EPOCH,
            step_id: None,
            step_number: None,
            step_action: None,
            expected_result: None,
            step_execution_type: None,
        }
    }

    pub(crate) fn step_row(case_id: i64, title: &str, step_number: i64) -> FlatRow {
        FlatRow {
            step_id: Some(case_id * 100 + step_number),
            step_number: Some(step_number),
            step_action: Some(format!("action {step_number}")),
            expected_result: Some(format!("result {step_number}")),
            step_execution_type: Some(ExecutionType::Manual),
            ..case_row(case_id, title)
        }
    }

    #[test]
    fn groups_rows_by_case_in_first_seen_order() {
        let rows = vec![
            step_row(101, "login", 1),
            step_row(101, "login", 2),
            step_row(101, "login", 3),
            case_row(102, "logout"),
            step_row(99, "late", 1),
        ];

        let cases = aggregate_rows(rows);

        let ids: Vec<i64> = cases.keys().copied().collect();
        assert_eq!(ids, vec![101, 102, 99]);
        assert_eq!(cases[&101].test_steps.len(), 3);
        assert!(cases[&102].test_steps.is_empty());
        assert_eq!(cases[&99].test_steps.len(), 1);

        let numbers: Vec<i64> = cases[&101]
            .test_steps
            .iter()
            .map(|step| step.step_number)
            .collect();
        assert_eq!(numbers, vec![1, 2, 3]);
    }

    #[test]
    fn keeps_input_order_instead_of_sorting_steps() {
        let rows = vec![step_row(7, "t", 3), step_row(7, "t", 1)];
        let cases = aggregate_rows(rows);
        let numbers: Vec<i64> = cases[&7].test_steps.iter().map(|s| s.step_number).collect();
        assert_eq!(numbers, vec![3, 1]);
    }

    #[test]
    fn step_number_zero_is_treated_as_no_step() {
        let rows = vec![step_row(5, "zero", 0), step_row(5, "zero", 1)];
        let cases = aggregate_rows(rows);
        assert_eq!(cases.len(), 1);
        assert_eq!(cases[&5].test_steps.len(), 1);
        assert_eq!(cases[&5].test_steps[0].step_number, 1);
    }

    #[test]
    fn negative_step_numbers_are_kept() {
        let cases = aggregate_rows(vec![step_row(5, "neg", -1)]);
        assert_eq!(cases[&5].test_steps[0].step_number, -1);
    }

    #[test]
    fn duplicate_step_numbers_are_all_appended() {
        let mut second = step_row(8, "dup", 2);
        second.step_id = Some(9999);
        second.step_action = Some("other action".to_string());
        let rows = vec![step_row(8, "dup", 1), step_row(8, "dup", 2), second];

        let cases = aggregate_rows(rows);
        let steps = &cases[&8].test_steps;
        assert_eq!(steps.len(), 3);
        assert_eq!(steps[1].step_number, 2);
        assert_eq!(steps[2].step_number, 2);
        assert_eq!(steps[2].step_action, "other action");
    }

    #[test]
    fn case_fields_come_from_the_first_row() {
        let mut first = step_row(3, "first title", 1);
        first.status = Status::Passed;
        let mut second = step_row(3, "ignored title", 2);
        second.status = Status::Failed;

        let cases = aggregate_rows(vec![first, second]);
        assert_eq!(cases[&3].title, "first title");
        assert_eq!(cases[&3].status, Status::Passed);
        assert!(cases[&3].test_steps.iter().all(|s| s.test_case_id == 3));
    }

    #[test]
    fn empty_input_yields_empty_map() {
        assert!(aggregate_rows(Vec::new()).is_empty());
    }
}
