use serde::{Deserialize, Serialize};
use std::fmt;
use time::OffsetDateTime;

pub const SPREADSHEET_CONTENT_TYPE: &str =
    "application/vnd.openxmlformats-officedocument.spreadsheetml.sheet";
pub const XML_CONTENT_TYPE: &str = "application/xml";

/// A persisted export. Rows are append-only: a newer export supersedes an
/// older one by being listed first, never by overwriting it.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ExportArtifact {
    pub id: i64,
    pub test_suite_id: i64,
    pub xml_file: String,
    /// Base64 text of the workbook bytes.
    pub excel_file_path: Option<String>,
    #[serde(with = "time::serde::rfc3339")]
    pub created_at: OffsetDateTime,
}

impl ExportArtifact {
    pub fn kind(&self) -> ArtifactKind {
        let has_excel = self
            .excel_file_path
            .as_deref()
            .is_some_and(|encoded| !encoded.is_empty());
        match (self.xml_file.is_empty(), has_excel) {
            (false, false) => ArtifactKind::Xml,
            (true, true) => ArtifactKind::Spreadsheet,
            (false, true) => ArtifactKind::Mixed,
            (true, false) => ArtifactKind::Empty,
        }
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum ArtifactKind {
    Xml,
    Spreadsheet,
    Mixed,
    Empty,
}

impl fmt::Display for ArtifactKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let value = match self {
            ArtifactKind::Xml => "xml",
            ArtifactKind::Spreadsheet => "spreadsheet",
            ArtifactKind::Mixed => "mixed",
            ArtifactKind::Empty => "empty",
        };
        write!(f, "{value}")
    }
}

/// Content handed to the store on creation. Binary content is encoded on the
/// way in; callers never see base64.
#[derive(Debug, Clone, Default)]
pub struct ArtifactContent {
    pub xml: Option<String>,
    pub excel: Option<Vec<u8>>,
}

impl ArtifactContent {
    pub fn xml(xml: impl Into<String>) -> Self {
        Self {
            xml: Some(xml.into()),
            excel: None,
        }
    }

    pub fn spreadsheet(bytes: Vec<u8>) -> Self {
        Self {
            xml: None,
            excel: Some(bytes),
        }
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum PayloadKind {
    Xml,
    Spreadsheet,
}

impl PayloadKind {
    pub fn missing_message(&self) -> &'static str {
        match self {
            PayloadKind::Xml => "No XML file found for this export",
            PayloadKind::Spreadsheet => "No Excel file found for this export",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Payload {
    Xml(String),
    Spreadsheet(Vec<u8>),
}

impl Payload {
    pub fn as_bytes(&self) -> &[u8] {
        match self {
            Payload::Xml(text) => text.as_bytes(),
            Payload::Spreadsheet(bytes) => bytes,
        }
    }
}

/// A payload ready to be streamed back as an attachment.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Download {
    pub content_type: &'static str,
    pub filename: String,
    pub bytes: Vec<u8>,
}

impl Download {
    pub fn content_disposition(&self) -> String {
        format!("attachment; filename=\"{}\"", self.filename)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn artifact(xml: &str, excel: Option<&str>) -> ExportArtifact {
        ExportArtifact {
            id: 1,
            test_suite_id: 201,
            xml_file: xml.to_string(),
            excel_file_path: excel.map(str::to_string),
            created_at: OffsetDateTime::UNIX_EPOCH,
        }
    }

    #[test]
    fn kind_follows_which_payload_is_present() {
        assert_eq!(artifact("<x/>", None).kind(), ArtifactKind::Xml);
        assert_eq!(artifact("", Some("UEs=")).kind(), ArtifactKind::Spreadsheet);
        assert_eq!(artifact("<x/>", Some("UEs=")).kind(), ArtifactKind::Mixed);
        assert_eq!(artifact("", Some("")).kind(), ArtifactKind::Empty);
    }

    #[test]
    fn download_advertises_attachment_filename() {
        let download = Download {
            content_type: SPREADSHEET_CONTENT_TYPE,
            filename: "export.xlsx".to_string(),
            bytes: vec![],
        };
        assert_eq!(
            download.content_disposition(),
            "attachment; filename=\"export.xlsx\""
        );
    }

    #[test]
    fn artifact_serializes_created_at_as_rfc3339() {
        let json = serde_json::to_value(artifact("<x/>", None)).expect("serialize");
        assert_eq!(json["created_at"], "1970-01-01T00:00:00Z");
        assert!(json["excel_file_path"].is_null());
    }
}
