use crate::aggregate::{aggregate_rows, FlatRow};
use crate::database::{now_micros, read_timestamp, Database};
use crate::error::{ExportError, ExportResult};
use crate::model::{
    CaseUpdate, NewTestCase, NewTestStep, Project, StepUpdate, SuiteInfo, TestCase, TestStep,
    TestSuite,
};
use rusqlite::{params, OptionalExtension, Row};

const CASE_NOT_FOUND: &str = "Test case not found";
const STEP_NOT_FOUND: &str = "Test step not found";
const SUITE_NOT_FOUND: &str = "Test suite not found";

const JOINED_ROWS: &str = "
    SELECT tc.id, tc.test_suite_id, tc.user_story_id, tc.title, tc.summary,
           tc.precondition, tc.postcondition, tc.status, tc.manual_edit,
           tc.importance, tc.execution_type, tc.created_at, tc.updated_at,
           ts.id, ts.step_number, ts.step_action, ts.expected_result,
           ts.execution_type AS step_execution_type
    FROM test_cases tc
    LEFT JOIN test_steps ts ON tc.id = ts.test_case_id";

const SUITE_STEPS: &str = "
    SELECT ts.id, ts.test_case_id, ts.step_number, ts.step_action,
           ts.expected_result, ts.execution_type
    FROM test_steps ts
    JOIN test_cases tc ON tc.id = ts.test_case_id
    WHERE tc.test_suite_id = ?1
    ORDER BY ts.test_case_id, ts.step_number, ts.id";

const STEP_COLUMNS: &str =
    "id, test_case_id, step_number, step_action, expected_result, execution_type";

fn flat_row(row: &Row<'_>) -> rusqlite::Result<FlatRow> {
    Ok(FlatRow {
        case_id: row.get(0)?,
        test_suite_id: row.get(1)?,
        user_story_id: row.get(2)?,
        title: row.get(3)?,
        summary: row.get(4)?,
        precondition: row.get(5)?,
        postcondition: row.get(6)?,
        status: row.get(7)?,
        manual_edit: row.get(8)?,
        importance: row.get(9)?,
        execution_type: row.get(10)?,
        created_at: read_timestamp(row, 11)?,
        updated_at: read_timestamp(row, 12)?,
        step_id: row.get(13)?,
        step_number: row.get(14)?,
        step_action: row.get(15)?,
        expected_result: row.get(16)?,
        step_execution_type: row.get(17)?,
    })
}

fn step_row(row: &Row<'_>) -> rusqlite::Result<TestStep> {
    Ok(TestStep {
        id: row.get(0)?,
        test_case_id: row.get(1)?,
        step_number: row.get(2)?,
        step_action: row.get(3)?,
        expected_result: row.get(4)?,
        execution_type: row.get(5)?,
    })
}

fn require_name(name: &str) -> ExportResult<&str> {
    let trimmed = name.trim();
    if trimmed.is_empty() {
        return Err(ExportError::validation("name is required"));
    }
    Ok(trimmed)
}

impl Database {
    pub fn create_project(&self, name: &str) -> ExportResult<Project> {
        let name = require_name(name)?;
        self.conn
            .execute("INSERT INTO projects (name) VALUES (?1)", params![name])?;
        Ok(Project {
            id: self.conn.last_insert_rowid(),
            name: name.to_string(),
        })
    }

    pub fn create_suite(
        &self,
        project_id: i64,
        name: &str,
        parent_suite_id: Option<i64>,
    ) -> ExportResult<TestSuite> {
        let name = require_name(name)?;
        if !self.exists("SELECT 1 FROM projects WHERE id = ?1", project_id)? {
            return Err(ExportError::not_found("Project not found"));
        }
        if let Some(parent) = parent_suite_id {
            if !self.exists("SELECT 1 FROM test_suites WHERE id = ?1", parent)? {
                return Err(ExportError::not_found("Parent test suite not found"));
            }
        }
        self.conn.execute(
            "INSERT INTO test_suites (project_id, parent_suite_id, name) VALUES (?1, ?2, ?3)",
            params![project_id, parent_suite_id, name],
        )?;
        Ok(TestSuite {
            id: self.conn.last_insert_rowid(),
            project_id,
            parent_suite_id,
            name: name.to_string(),
        })
    }

    pub fn list_suites(&self, project_id: i64) -> ExportResult<Vec<TestSuite>> {
        let mut stmt = self.conn.prepare(
            "SELECT id, project_id, parent_suite_id, name FROM test_suites
             WHERE project_id = ?1 ORDER BY id",
        )?;
        let suites = stmt
            .query_map(params![project_id], |row| {
                Ok(TestSuite {
                    id: row.get(0)?,
                    project_id: row.get(1)?,
                    parent_suite_id: row.get(2)?,
                    name: row.get(3)?,
                })
            })?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(suites)
    }

    pub fn suite_info(&self, test_suite_id: i64) -> ExportResult<SuiteInfo> {
        self.conn
            .query_row(
                "SELECT ts.id, ts.name, p.id, p.name
                 FROM test_suites ts
                 JOIN projects p ON ts.project_id = p.id
                 WHERE ts.id = ?1",
                params![test_suite_id],
                |row| {
                    Ok(SuiteInfo {
                        test_suite_id: row.get(0)?,
                        test_suite_name: row.get(1)?,
                        project_id: row.get(2)?,
                        project_name: row.get(3)?,
                    })
                },
            )
            .optional()?
            .ok_or_else(|| ExportError::not_found(SUITE_NOT_FOUND))
    }

    /// The suite's cases joined with their steps, ordered by case id and then
    /// step number. This is the input contract of `aggregate_rows`.
    pub fn case_rows(&self, test_suite_id: i64) -> ExportResult<Vec<FlatRow>> {
        let sql = format!(
            "{JOINED_ROWS} WHERE tc.test_suite_id = ?1 ORDER BY tc.id, ts.step_number, ts.id"
        );
        let mut stmt = self.conn.prepare(&sql)?;
        let rows = stmt
            .query_map(params![test_suite_id], flat_row)?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(rows)
    }

    /// Catalog view of a suite. Case order comes from the row aggregator, but
    /// every stored step is attached, including the ones numbered 0 that the
    /// export feed drops.
    pub fn list_cases(&self, test_suite_id: i64) -> ExportResult<Vec<TestCase>> {
        let mut cases = aggregate_rows(self.case_rows(test_suite_id)?);
        for case in cases.values_mut() {
            case.test_steps.clear();
        }
        let mut stmt = self.conn.prepare(SUITE_STEPS)?;
        let steps = stmt
            .query_map(params![test_suite_id], step_row)?
            .collect::<Result<Vec<_>, _>>()?;
        for step in steps {
            if let Some(case) = cases.get_mut(&step.test_case_id) {
                case.test_steps.push(step);
            }
        }
        Ok(cases.into_values().collect())
    }

    pub fn get_case(&self, case_id: i64) -> ExportResult<TestCase> {
        let sql = format!("{JOINED_ROWS} WHERE tc.id = ?1 ORDER BY ts.step_number, ts.id");
        let mut stmt = self.conn.prepare(&sql)?;
        let rows = stmt
            .query_map(params![case_id], flat_row)?
            .collect::<Result<Vec<_>, _>>()?;
        let mut case = aggregate_rows(rows)
            .swap_remove(&case_id)
            .ok_or_else(|| ExportError::not_found(CASE_NOT_FOUND))?;
        case.test_steps = self.case_steps(case_id)?;
        Ok(case)
    }

    /// Every stored step of a case ordered by step number, then id.
    pub fn case_steps(&self, case_id: i64) -> ExportResult<Vec<TestStep>> {
        let sql = format!(
            "SELECT {STEP_COLUMNS} FROM test_steps
             WHERE test_case_id = ?1
             ORDER BY step_number, id"
        );
        let mut stmt = self.conn.prepare(&sql)?;
        let steps = stmt
            .query_map(params![case_id], step_row)?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(steps)
    }

    pub fn create_case(&self, case: &NewTestCase) -> ExportResult<TestCase> {
        if !self.exists("SELECT 1 FROM test_suites WHERE id = ?1", case.test_suite_id)? {
            return Err(ExportError::not_found(SUITE_NOT_FOUND));
        }
        let now = now_micros();
        self.conn.execute(
            "INSERT INTO test_cases (
                test_suite_id, user_story_id, title, summary, precondition, postcondition,
                status, manual_edit, importance, execution_type, created_at, updated_at
             ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?11)",
            params![
                case.test_suite_id,
                case.user_story_id,
                case.title,
                case.summary,
                case.precondition,
                case.postcondition,
                case.status,
                case.manual_edit,
                case.importance,
                case.execution_type,
                now,
            ],
        )?;
        let id = self.conn.last_insert_rowid();
        log::info!("created test case {id} in suite {}", case.test_suite_id);
        self.get_case(id)
    }

    pub fn update_case(&self, case_id: i64, update: &CaseUpdate) -> ExportResult<TestCase> {
        let changed = self.conn.execute(
            "UPDATE test_cases SET
                title = ?1, summary = ?2, precondition = ?3, postcondition = ?4,
                status = ?5, manual_edit = ?6, importance = ?7, execution_type = ?8,
                updated_at = ?9
             WHERE id = ?10",
            params![
                update.title,
                update.summary,
                update.precondition,
                update.postcondition,
                update.status,
                update.manual_edit,
                update.importance,
                update.execution_type,
                now_micros(),
                case_id,
            ],
        )?;
        if changed == 0 {
            return Err(ExportError::not_found(
                "Test case with the provided ID does not exist",
            ));
        }
        self.get_case(case_id)
    }

    /// Deletes a test case together with its steps and returns what was
    /// removed.
    pub fn delete_case(&self, case_id: i64) -> ExportResult<TestCase> {
        let case = self.get_case(case_id)?;
        self.conn
            .execute("DELETE FROM test_cases WHERE id = ?1", params![case_id])?;
        log::info!(
            "deleted test case {case_id} and {} step(s)",
            case.test_steps.len()
        );
        Ok(case)
    }

    pub fn create_step(&self, step: &NewTestStep) -> ExportResult<TestStep> {
        if !self.exists("SELECT 1 FROM test_cases WHERE id = ?1", step.test_case_id)? {
            return Err(ExportError::not_found(CASE_NOT_FOUND));
        }
        self.conn.execute(
            "INSERT INTO test_steps (
                test_case_id, step_number, step_action, expected_result, execution_type
             ) VALUES (?1, ?2, ?3, ?4, ?5)",
            params![
                step.test_case_id,
                step.step_number,
                step.step_action,
                step.expected_result,
                step.execution_type,
            ],
        )?;
        self.get_step(self.conn.last_insert_rowid())
    }

    pub fn get_step(&self, step_id: i64) -> ExportResult<TestStep> {
        let sql = format!("SELECT {STEP_COLUMNS} FROM test_steps WHERE id = ?1");
        self.conn
            .query_row(&sql, params![step_id], step_row)
            .optional()?
            .ok_or_else(|| ExportError::not_found(STEP_NOT_FOUND))
    }

    pub fn update_step(&self, step_id: i64, update: &StepUpdate) -> ExportResult<TestStep> {
        let changed = self.conn.execute(
            "UPDATE test_steps SET
                step_number = ?1, step_action = ?2, expected_result = ?3, execution_type = ?4
             WHERE id = ?5",
            params![
                update.step_number,
                update.step_action,
                update.expected_result,
                update.execution_type,
                step_id,
            ],
        )?;
        if changed == 0 {
            return Err(ExportError::not_found(STEP_NOT_FOUND));
        }
        self.get_step(step_id)
    }

    pub fn delete_step(&self, step_id: i64) -> ExportResult<TestStep> {
        let step = self.get_step(step_id)?;
        self.conn
            .execute("DELETE FROM test_steps WHERE id = ?1", params![step_id])?;
        Ok(step)
    }

    fn exists(&self, sql: &str, id: i64) -> ExportResult<bool> {
        let found = self
            .conn
            .query_row(sql, params![id], |_| Ok(()))
            .optional()?;
        Ok(found.is_some())
    }
}
