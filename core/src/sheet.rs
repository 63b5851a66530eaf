//! Spreadsheet export: one "Test Cases" sheet, one row per test case, steps
//! folded into two aligned multi-line cells.

use crate::config::SheetLabels;
use crate::model::TestCase;
use comfy_table::{presets::ASCII_FULL, Table};
use rust_xlsxwriter::{Format, FormatAlign, Workbook, XlsxError};
use serde::{Deserialize, Serialize};
use std::borrow::Cow;

pub const SHEET_NAME: &str = "Test Cases";

/// Excel refuses cell text longer than this many characters.
pub const MAX_CELL_CHARS: usize = 32_767;

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SheetColumn {
    pub header: &'static str,
    pub width: f64,
}

pub const COLUMNS: [SheetColumn; 10] = [
    SheetColumn { header: "Testrail ID", width: 15.0 },
    SheetColumn { header: "Section", width: 30.0 },
    SheetColumn { header: "Sub-Section", width: 30.0 },
    SheetColumn { header: "Test case title", width: 40.0 },
    SheetColumn { header: "Preconditions", width: 40.0 },
    SheetColumn { header: "Steps", width: 40.0 },
    SheetColumn { header: "Expected Results", width: 40.0 },
    SheetColumn { header: "Result (OK / KO)", width: 15.0 },
    SheetColumn { header: "Bug description", width: 30.0 },
    SheetColumn { header: "Link", width: 30.0 },
];

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct SheetRow {
    pub id: String,
    pub section: String,
    pub sub_section: String,
    pub title: String,
    pub preconditions: String,
    pub steps: String,
    pub expected_results: String,
    pub result: String,
    pub bug_description: String,
    pub link: String,
}

impl SheetRow {
    pub fn from_case(case: &TestCase, labels: &SheetLabels) -> Self {
        let steps = case
            .test_steps
            .iter()
            .map(|step| format!("{}. {}", step.step_number, step.step_action))
            .collect::<Vec<_>>()
            .join("\n");
        let expected_results = case
            .test_steps
            .iter()
            .map(|step| format!("{}. {}", step.step_number, step.expected_result))
            .collect::<Vec<_>>()
            .join("\n");

        Self {
            id: format!("C{}", case.id),
            section: labels.section.clone(),
            sub_section: labels.sub_section.clone(),
            title: case.title.clone(),
            preconditions: case.precondition.clone(),
            steps,
            expected_results,
            result: String::new(),
            bug_description: String::new(),
            link: String::new(),
        }
    }

    /// Cells in column order.
    pub fn cells(&self) -> [&str; 10] {
        [
            &self.id,
            &self.section,
            &self.sub_section,
            &self.title,
            &self.preconditions,
            &self.steps,
            &self.expected_results,
            &self.result,
            &self.bug_description,
            &self.link,
        ]
    }
}

pub fn build_rows<'a, I>(cases: I, labels: &SheetLabels) -> Vec<SheetRow>
where
    I: IntoIterator<Item = &'a TestCase>,
{
    cases
        .into_iter()
        .map(|case| SheetRow::from_case(case, labels))
        .collect()
}

/// Writes the rows into an in-memory xlsx workbook.
pub fn render_workbook(rows: &[SheetRow]) -> Result<Vec<u8>, XlsxError> {
    let mut workbook = Workbook::new();
    let header_format = Format::new()
        .set_bold()
        .set_align(FormatAlign::Center)
        .set_align(FormatAlign::VerticalCenter);

    let worksheet = workbook.add_worksheet();
    worksheet.set_name(SHEET_NAME)?;

    for (col, column) in COLUMNS.iter().enumerate() {
        let col = col as u16;
        worksheet.set_column_width(col, column.width)?;
        worksheet.write_string_with_format(0, col, column.header, &header_format)?;
    }

    for (index, row) in rows.iter().enumerate() {
        let row_num = index as u32 + 1;
        for (col, value) in row.cells().iter().enumerate() {
            let value = fit_cell(value);
            if let Cow::Owned(_) = value {
                log::warn!(
                    "{}: {} cut to {MAX_CELL_CHARS} characters",
                    row.id,
                    COLUMNS[col].header
                );
            }
            worksheet.write_string(row_num, col as u16, &*value)?;
        }
    }

    workbook.save_to_buffer()
}

/// Truncates on a char boundary so the cell stays within Excel's limit.
fn fit_cell(value: &str) -> Cow<'_, str> {
    match value.char_indices().nth(MAX_CELL_CHARS) {
        Some((end, _)) => Cow::Owned(value[..end].to_string()),
        None => Cow::Borrowed(value),
    }
}

/// Terminal rendering of the same rows.
pub fn preview(rows: &[SheetRow]) -> String {
    let mut display = Table::new();
    display.load_preset(ASCII_FULL);
    display.set_header(COLUMNS.iter().map(|column| column.header));

    for row in rows {
        display.add_row(row.cells());
    }

    display.to_string()
}
