//! Artifact store: append-only export rows with base64-encoded workbooks.

use crate::artifact::{ArtifactContent, ExportArtifact, Payload, PayloadKind};
use crate::database::{read_timestamp, Database};
use crate::error::{ExportError, ExportResult};
use base64::engine::general_purpose::STANDARD;
use base64::Engine as _;
use rusqlite::{params, OptionalExtension, Row};

const EXPORT_COLUMNS: &str = "id, test_suite_id, xml_file, excel_file_path, created_at";

fn export_row(row: &Row<'_>) -> rusqlite::Result<ExportArtifact> {
    Ok(ExportArtifact {
        id: row.get(0)?,
        test_suite_id: row.get(1)?,
        xml_file: row.get(2)?,
        excel_file_path: row.get(3)?,
        created_at: read_timestamp(row, 4)?,
    })
}

impl Database {
    /// Inserts a new export row. Existing rows are never touched; a second
    /// export of the same suite is a second row.
    pub fn create_export(
        &self,
        test_suite_id: i64,
        content: ArtifactContent,
    ) -> ExportResult<ExportArtifact> {
        let xml_file = content.xml.unwrap_or_default();
        let excel_file_path = content.excel.map(|bytes| STANDARD.encode(bytes));
        let created_at = self.next_export_stamp();

        self.conn.execute(
            "INSERT INTO exports (test_suite_id, xml_file, excel_file_path, created_at)
             VALUES (?1, ?2, ?3, ?4)",
            params![test_suite_id, xml_file, excel_file_path, created_at],
        )?;
        let id = self.conn.last_insert_rowid();
        self.get_export(id)
    }

    /// Exports of a suite, newest first. No rows is an empty list.
    pub fn list_exports(&self, test_suite_id: i64) -> ExportResult<Vec<ExportArtifact>> {
        let sql = format!(
            "SELECT {EXPORT_COLUMNS} FROM exports
             WHERE test_suite_id = ?1
             ORDER BY created_at DESC, id DESC"
        );
        let mut stmt = self.conn.prepare(&sql)?;
        let exports = stmt
            .query_map(params![test_suite_id], export_row)?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(exports)
    }

    pub fn get_export(&self, artifact_id: i64) -> ExportResult<ExportArtifact> {
        let sql = format!("SELECT {EXPORT_COLUMNS} FROM exports WHERE id = ?1");
        self.conn
            .query_row(&sql, params![artifact_id], export_row)
            .optional()?
            .ok_or_else(|| ExportError::not_found("Not found"))
    }

    /// Returns the stored payload verbatim, decoding base64 for workbooks.
    pub fn export_payload(&self, artifact_id: i64, kind: PayloadKind) -> ExportResult<Payload> {
        let artifact = self.get_export(artifact_id)?;
        match kind {
            PayloadKind::Xml => {
                if artifact.xml_file.is_empty() {
                    return Err(ExportError::NoContent(kind.missing_message().to_string()));
                }
                Ok(Payload::Xml(artifact.xml_file))
            }
            PayloadKind::Spreadsheet => {
                let encoded = artifact
                    .excel_file_path
                    .filter(|encoded| !encoded.is_empty())
                    .ok_or_else(|| ExportError::NoContent(kind.missing_message().to_string()))?;
                let bytes = STANDARD
                    .decode(encoded.as_bytes())
                    .map_err(|err| ExportError::CorruptPayload {
                        id: artifact_id,
                        reason: err.to_string(),
                    })?;
                Ok(Payload::Spreadsheet(bytes))
            }
        }
    }
}
