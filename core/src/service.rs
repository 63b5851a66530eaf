//! The export pipeline: aggregate a suite, render it, persist the artifact.

use crate::aggregate::{aggregate_rows, CaseMap};
use crate::artifact::{
    ArtifactContent, Download, ExportArtifact, Payload, PayloadKind, SPREADSHEET_CONTENT_TYPE,
    XML_CONTENT_TYPE,
};
use crate::config::Config;
use crate::database::Database;
use crate::error::{ExportError, ExportResult};
use crate::sheet::{self, SheetRow};
use crate::validation::validate_suite;
use crate::webhook::{Forwarder, HttpForwarder, WebhookPayload};
use crate::xml;
use serde::{Deserialize, Serialize};
use std::fmt;

const XML_DOWNLOAD_FILENAME: &str = "export.xml";

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum ExportFormat {
    /// `<testcases>` document with project and suite metadata.
    GenericXml,
    /// TestLink `<testsuite>` import document.
    TestlinkXml,
    Spreadsheet,
}

impl ExportFormat {
    pub fn as_str(&self) -> &'static str {
        match self {
            ExportFormat::GenericXml => "generic xml",
            ExportFormat::TestlinkXml => "testlink xml",
            ExportFormat::Spreadsheet => "spreadsheet",
        }
    }

    pub fn payload_kind(&self) -> PayloadKind {
        match self {
            ExportFormat::GenericXml | ExportFormat::TestlinkXml => PayloadKind::Xml,
            ExportFormat::Spreadsheet => PayloadKind::Spreadsheet,
        }
    }
}

impl fmt::Display for ExportFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ForwardReceipt {
    pub message: String,
}

pub struct ExportService {
    db: Database,
    config: Config,
    forwarder: Box<dyn Forwarder>,
}

impl ExportService {
    pub fn new(db: Database, config: Config) -> Self {
        let forwarder = Box::new(HttpForwarder::new(&config.webhook));
        Self::with_forwarder(db, config, forwarder)
    }

    pub fn with_forwarder(db: Database, config: Config, forwarder: Box<dyn Forwarder>) -> Self {
        Self {
            db,
            config,
            forwarder,
        }
    }

    pub fn database(&self) -> &Database {
        &self.db
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    /// Loads the suite's cases through the row aggregator. Diagnostics are
    /// computed on the stored steps, before aggregation drops any of them,
    /// and are logged without blocking the export.
    fn aggregate_suite(&self, test_suite_id: i64) -> ExportResult<CaseMap> {
        let stored = self.db.list_cases(test_suite_id)?;
        for diagnostic in validate_suite(&stored) {
            log::warn!(
                "suite {test_suite_id}: {} {}: {}",
                diagnostic.level.as_str(),
                diagnostic.location,
                diagnostic.message
            );
        }

        let rows = self.db.case_rows(test_suite_id)?;
        let row_count = rows.len();
        let cases = aggregate_rows(rows);
        log::debug!(
            "aggregated {row_count} row(s) into {} test case(s) for suite {test_suite_id}",
            cases.len()
        );
        Ok(cases)
    }

    pub fn generate(
        &self,
        test_suite_id: i64,
        format: ExportFormat,
    ) -> ExportResult<ExportArtifact> {
        let suite = self.db.suite_info(test_suite_id)?;
        let cases = self.aggregate_suite(test_suite_id)?;

        let content = match format {
            ExportFormat::GenericXml => {
                ArtifactContent::xml(xml::render_generic(&suite, cases.values()))
            }
            ExportFormat::TestlinkXml => {
                ArtifactContent::xml(xml::render_testlink(&suite.test_suite_name, cases.values()))
            }
            ExportFormat::Spreadsheet => {
                let rows = sheet::build_rows(cases.values(), &self.config.spreadsheet);
                let bytes = sheet::render_workbook(&rows).map_err(|err| ExportError::Render {
                    format: format.as_str(),
                    reason: err.to_string(),
                })?;
                ArtifactContent::spreadsheet(bytes)
            }
        };

        let artifact = self.db.create_export(test_suite_id, content)?;
        log::info!(
            "created {format} export {} for suite {test_suite_id} ({} test case(s))",
            artifact.id,
            cases.len()
        );
        Ok(artifact)
    }

    /// Spreadsheet rows for a suite without persisting anything.
    pub fn preview_rows(&self, test_suite_id: i64) -> ExportResult<Vec<SheetRow>> {
        self.db.suite_info(test_suite_id)?;
        let cases = self.aggregate_suite(test_suite_id)?;
        Ok(sheet::build_rows(cases.values(), &self.config.spreadsheet))
    }

    pub fn list_exports(&self, test_suite_id: i64) -> ExportResult<Vec<ExportArtifact>> {
        self.db.list_exports(test_suite_id)
    }

    pub fn get_export(&self, artifact_id: i64) -> ExportResult<ExportArtifact> {
        self.db.get_export(artifact_id)
    }

    pub fn payload(&self, artifact_id: i64, kind: PayloadKind) -> ExportResult<Payload> {
        self.db.export_payload(artifact_id, kind)
    }

    /// Every workbook download advertises the same configured filename.
    pub fn download(&self, artifact_id: i64, kind: PayloadKind) -> ExportResult<Download> {
        let payload = self.db.export_payload(artifact_id, kind)?;
        let download = match payload {
            Payload::Spreadsheet(bytes) => Download {
                content_type: SPREADSHEET_CONTENT_TYPE,
                filename: self.config.spreadsheet.download_filename.clone(),
                bytes,
            },
            Payload::Xml(text) => Download {
                content_type: XML_CONTENT_TYPE,
                filename: XML_DOWNLOAD_FILENAME.to_string(),
                bytes: text.into_bytes(),
            },
        };
        Ok(download)
    }

    pub fn download_spreadsheet(&self, artifact_id: i64) -> ExportResult<Download> {
        self.download(artifact_id, PayloadKind::Spreadsheet)
    }

    /// Renders the selected test cases as a generic XML document and posts it
    /// to the automation webhook. Nothing is persisted.
    pub fn forward(
        &self,
        test_suite_id: i64,
        selected_case_ids: &[i64],
    ) -> ExportResult<ForwardReceipt> {
        if selected_case_ids.is_empty() {
            return Err(ExportError::validation(
                "Please select at least one test case to export",
            ));
        }
        let suite = self.db.suite_info(test_suite_id)?;
        let cases = self.aggregate_suite(test_suite_id)?;

        if let Some(missing) = selected_case_ids.iter().find(|id| !cases.contains_key(*id)) {
            return Err(ExportError::not_found(format!(
                "Test case {missing} is not part of test suite {test_suite_id}"
            )));
        }
        let selected = cases
            .values()
            .filter(|case| selected_case_ids.contains(&case.id));

        let payload = WebhookPayload {
            xml: xml::render_generic(&suite, selected),
            test_suite_id,
        };
        self.forwarder.forward(&payload)?;
        log::info!(
            "forwarded {} test case(s) of suite {test_suite_id} to the automation webhook",
            selected_case_ids.len()
        );
        Ok(ForwardReceipt {
            message: "Successfully sent to automation workflow".to_string(),
        })
    }
}
