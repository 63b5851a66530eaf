//! Sorting and filtering of test case listings.

use crate::model::{Status, TestCase};
use serde::{Deserialize, Serialize};
use std::cmp::Ordering;

#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum SortKey {
    #[default]
    Id,
    Title,
    Status,
    Importance,
    CreatedAt,
    UpdatedAt,
}

#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum SortDirection {
    #[default]
    Asc,
    Desc,
}

impl SortKey {
    pub fn compare(&self, a: &TestCase, b: &TestCase) -> Ordering {
        let primary = match self {
            SortKey::Id => a.id.cmp(&b.id),
            SortKey::Title => compare_text(&a.title, &b.title),
            SortKey::Status => a.status.as_str().cmp(b.status.as_str()),
            SortKey::Importance => a.importance.rank().cmp(&b.importance.rank()),
            SortKey::CreatedAt => a.created_at.cmp(&b.created_at),
            SortKey::UpdatedAt => a.updated_at.cmp(&b.updated_at),
        };
        primary.then_with(|| a.id.cmp(&b.id))
    }
}

fn compare_text(a: &str, b: &str) -> Ordering {
    a.to_lowercase().cmp(&b.to_lowercase())
}

pub fn sort_cases(cases: &mut [TestCase], key: SortKey, direction: SortDirection) {
    cases.sort_by(|a, b| {
        let ordering = key.compare(a, b);
        match direction {
            SortDirection::Asc => ordering,
            SortDirection::Desc => ordering.reverse(),
        }
    });
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct CaseFilter {
    pub search: Option<String>,
    pub status: Option<Status>,
}

impl CaseFilter {
    pub fn matches(&self, case: &TestCase) -> bool {
        if let Some(status) = self.status {
            if case.status != status {
                return false;
            }
        }
        match self.search.as_deref().map(str::trim) {
            Some(term) if !term.is_empty() => {
                let term = term.to_lowercase();
                case.title.to_lowercase().contains(&term)
                    || case.summary.to_lowercase().contains(&term)
            }
            _ => true,
        }
    }

    pub fn apply(&self, cases: Vec<TestCase>) -> Vec<TestCase> {
        cases.into_iter().filter(|case| self.matches(case)).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{ExecutionType, Importance};
    use time::{Duration, OffsetDateTime};

    fn case(id: i64, title: &str, importance: Importance, age_days: i64) -> TestCase {
        let created = OffsetDateTime::UNIX_EPOCH + Duration::days(100 - age_days);
        TestCase {
            id,
            test_suite_id: 1,
            user_story_id: None,
            title: title.to_string(),
            summary: format!("about {title}"),
            precondition: String::new(),
            postcondition: String::new(),
            status: Status::NotRun,
            manual_edit: false,
            importance,
            execution_type: ExecutionType::Manual,
            created_at: created,
            updated_at: created,
            test_steps: Vec::new(),
        }
    }

    fn ids(cases: &[TestCase]) -> Vec<i64> {
        cases.iter().map(|case| case.id).collect()
    }

    fn sample() -> Vec<TestCase> {
        vec![
            case(1, "beta", Importance::Low, 1),
            case(2, "Alpha", Importance::High, 3),
            case(3, "gamma", Importance::Medium, 2),
        ]
    }

    #[test]
    fn sorts_by_each_key() {
        let mut cases = sample();
        sort_cases(&mut cases, SortKey::Title, SortDirection::Asc);
        assert_eq!(ids(&cases), vec![2, 1, 3]);

        sort_cases(&mut cases, SortKey::Importance, SortDirection::Desc);
        assert_eq!(ids(&cases), vec![2, 3, 1]);

        sort_cases(&mut cases, SortKey::CreatedAt, SortDirection::Asc);
        assert_eq!(ids(&cases), vec![2, 3, 1]);

        sort_cases(&mut cases, SortKey::Id, SortDirection::Asc);
        assert_eq!(ids(&cases), vec![1, 2, 3]);
    }

    #[test]
    fn ties_fall_back_to_id() {
        let mut cases = sample();
        sort_cases(&mut cases, SortKey::Status, SortDirection::Asc);
        assert_eq!(ids(&cases), vec![1, 2, 3]);
    }

    #[test]
    fn filter_matches_title_or_summary_case_insensitively() {
        let filter = CaseFilter {
            search: Some("ALPHA".to_string()),
            status: None,
        };
        assert_eq!(ids(&filter.apply(sample())), vec![2]);

        let filter = CaseFilter {
            search: Some("about".to_string()),
            status: Some(Status::Passed),
        };
        assert!(filter.apply(sample()).is_empty());

        assert_eq!(ids(&CaseFilter::default().apply(sample())), vec![1, 2, 3]);
    }
}
