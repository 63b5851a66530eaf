//! Request/response contract for the adapter layer. Identifiers arrive as
//! raw optional strings; failures leave as a status code plus a JSON body.

use crate::artifact::{Download, ExportArtifact, PayloadKind};
use crate::database::Database;
use crate::error::{ExportError, ExportResult};
use crate::service::{ExportFormat, ExportService, ForwardReceipt};
use crate::sheet::SheetRow;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ErrorBody {
    pub error: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub details: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, thiserror::Error)]
#[error("{status} {}", body.error)]
pub struct ApiError {
    pub status: u16,
    pub body: ErrorBody,
}

impl ApiError {
    /// Client errors keep their own message. Server errors are logged and
    /// reported as `failure`, with the cause moved into `details`.
    pub fn from_export(err: ExportError, failure: &str) -> Self {
        let status = err.status();
        if err.is_client_error() {
            return Self {
                status,
                body: ErrorBody {
                    error: err.to_string(),
                    details: None,
                },
            };
        }
        log::error!("{failure}: {err}");
        Self {
            status,
            body: ErrorBody {
                error: failure.to_string(),
                details: Some(err.to_string()),
            },
        }
    }
}

pub fn parse_id(raw: Option<&str>, field: &str) -> ExportResult<i64> {
    let raw = raw
        .map(str::trim)
        .filter(|value| !value.is_empty())
        .ok_or_else(|| ExportError::validation(format!("{field} is required")))?;
    raw.parse()
        .map_err(|_| ExportError::validation(format!("{field} must be an integer")))
}

pub struct Api {
    service: ExportService,
}

impl Api {
    pub fn new(service: ExportService) -> Self {
        Self { service }
    }

    pub fn service(&self) -> &ExportService {
        &self.service
    }

    fn generate(
        &self,
        test_suite_id: Option<&str>,
        format: ExportFormat,
        failure: &str,
    ) -> Result<ExportArtifact, ApiError> {
        parse_id(test_suite_id, "test_suite_id")
            .and_then(|id| self.service.generate(id, format))
            .map_err(|err| ApiError::from_export(err, failure))
    }

    pub fn generate_xml(&self, test_suite_id: Option<&str>) -> Result<ExportArtifact, ApiError> {
        self.generate(test_suite_id, ExportFormat::GenericXml, "Failed to generate XML")
    }

    pub fn generate_testlink_xml(
        &self,
        test_suite_id: Option<&str>,
    ) -> Result<ExportArtifact, ApiError> {
        self.generate(test_suite_id, ExportFormat::TestlinkXml, "Failed to generate XML")
    }

    pub fn generate_spreadsheet(
        &self,
        test_suite_id: Option<&str>,
    ) -> Result<ExportArtifact, ApiError> {
        self.generate(test_suite_id, ExportFormat::Spreadsheet, "Failed to generate Excel")
    }

    pub fn preview_spreadsheet(
        &self,
        test_suite_id: Option<&str>,
    ) -> Result<Vec<SheetRow>, ApiError> {
        parse_id(test_suite_id, "test_suite_id")
            .and_then(|id| self.service.preview_rows(id))
            .map_err(|err| ApiError::from_export(err, "Failed to generate Excel"))
    }

    pub fn list_exports(
        &self,
        test_suite_id: Option<&str>,
    ) -> Result<Vec<ExportArtifact>, ApiError> {
        parse_id(test_suite_id, "test_suite_id")
            .and_then(|id| self.service.list_exports(id))
            .map_err(|err| ApiError::from_export(err, "Failed to fetch exports"))
    }

    pub fn get_export(&self, id: Option<&str>) -> Result<ExportArtifact, ApiError> {
        parse_id(id, "id")
            .and_then(|id| self.service.get_export(id))
            .map_err(|err| ApiError::from_export(err, "Failed to fetch export"))
    }

    /// Download with a missing id is `400 "Missing id"` rather than the usual
    /// "<field> is required".
    pub fn download_spreadsheet(&self, id: Option<&str>) -> Result<Download, ApiError> {
        self.download(id, PayloadKind::Spreadsheet)
    }

    pub fn download_xml(&self, id: Option<&str>) -> Result<Download, ApiError> {
        self.download(id, PayloadKind::Xml)
    }

    fn download(&self, id: Option<&str>, kind: PayloadKind) -> Result<Download, ApiError> {
        let id = match id.map(str::trim).filter(|value| !value.is_empty()) {
            Some(raw) => raw
                .parse::<i64>()
                .map_err(|_| ExportError::validation("id must be an integer")),
            None => Err(ExportError::validation("Missing id")),
        };
        id.and_then(|id| self.service.download(id, kind))
            .map_err(|err| ApiError::from_export(err, "Failed to download export"))
    }

    pub fn forward(
        &self,
        test_suite_id: Option<&str>,
        case_ids: &[i64],
    ) -> Result<ForwardReceipt, ApiError> {
        parse_id(test_suite_id, "test_suite_id")
            .and_then(|id| self.service.forward(id, case_ids))
            .map_err(|err| ApiError::from_export(err, "Failed to export to XML"))
    }

    /// Runs a catalog operation with the same error contract as the export
    /// operations.
    pub fn catalog<T, F>(&self, failure: &str, op: F) -> Result<T, ApiError>
    where
        F: FnOnce(&Database) -> ExportResult<T>,
    {
        op(self.service.database()).map_err(|err| ApiError::from_export(err, failure))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::service::tests::{service_with, RecordingForwarder};

    #[test]
    fn parse_id_requires_an_integer() {
        assert_eq!(parse_id(Some(" 42 "), "test_suite_id").expect("id"), 42);
        let err = parse_id(None, "test_suite_id").unwrap_err();
        assert_eq!(err.to_string(), "test_suite_id is required");
        let err = parse_id(Some(""), "test_suite_id").unwrap_err();
        assert_eq!(err.status(), 400);
        let err = parse_id(Some("abc"), "id").unwrap_err();
        assert_eq!(err.to_string(), "id must be an integer");
    }

    #[test]
    fn missing_suite_id_is_a_bad_request() {
        let (service, _, _, _) = service_with(RecordingForwarder::default());
        let api = Api::new(service);
        let err = api.generate_spreadsheet(None).unwrap_err();
        assert_eq!(err.status, 400);
        assert_eq!(err.body.error, "test_suite_id is required");
        assert_eq!(err.body.details, None);
    }

    #[test]
    fn listing_without_exports_is_an_empty_list() {
        let (service, suite, _, _) = service_with(RecordingForwarder::default());
        let api = Api::new(service);
        let listed = api.list_exports(Some(&suite.to_string())).expect("list");
        assert!(listed.is_empty());
        let json = serde_json::to_string(&listed).expect("serialize");
        assert_eq!(json, "[]");
    }

    #[test]
    fn downloading_an_xml_only_export_as_spreadsheet_is_not_found() {
        let (service, suite, _, _) = service_with(RecordingForwarder::default());
        let api = Api::new(service);
        let artifact = api.generate_xml(Some(&suite.to_string())).expect("xml export");

        let err = api
            .download_spreadsheet(Some(&artifact.id.to_string()))
            .unwrap_err();
        assert_eq!(err.status, 404);
        assert_eq!(err.body.error, "No Excel file found for this export");

        let err = api.download_spreadsheet(Some("9999")).unwrap_err();
        assert_eq!((err.status, err.body.error.as_str()), (404, "Not found"));

        let err = api.download_spreadsheet(None).unwrap_err();
        assert_eq!((err.status, err.body.error.as_str()), (400, "Missing id"));

        let download = api
            .download_xml(Some(&artifact.id.to_string()))
            .expect("xml download");
        assert_eq!(download.bytes, artifact.xml_file.into_bytes());
    }

    #[test]
    fn downstream_rejection_is_a_server_error_with_details() {
        let forwarder = RecordingForwarder {
            reject_with: Some(500),
            ..RecordingForwarder::default()
        };
        let (service, suite, a, _) = service_with(forwarder);
        let api = Api::new(service);
        let err = api.forward(Some(&suite.to_string()), &[a]).unwrap_err();
        assert_eq!(err.status, 500);
        assert_eq!(err.body.error, "Failed to export to XML");
        assert!(err
            .body
            .details
            .as_deref()
            .is_some_and(|details| details.contains("500")));

        let body = serde_json::to_value(&err.body).expect("serialize");
        assert_eq!(body["error"], "Failed to export to XML");
    }

    #[test]
    fn catalog_errors_share_the_contract() {
        let (service, _, _, _) = service_with(RecordingForwarder::default());
        let api = Api::new(service);
        let err = api
            .catalog("Failed to fetch test case", |db| db.get_case(31337))
            .unwrap_err();
        assert_eq!(err.status, 404);
        assert_eq!(err.body.error, "Test case not found");
    }
}
