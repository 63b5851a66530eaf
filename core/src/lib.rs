pub mod aggregate;
pub mod api;
pub mod artifact;
pub mod catalog;
pub mod config;
pub mod database;
pub mod error;
pub mod exports;
pub mod listing;
pub mod model;
pub mod service;
pub mod sheet;
pub mod validation;
pub mod webhook;
pub mod xml;

pub use aggregate::{aggregate_rows, CaseMap, FlatRow};
pub use api::{parse_id, Api, ApiError, ErrorBody};
pub use artifact::{
    ArtifactContent, ArtifactKind, Download, ExportArtifact, Payload, PayloadKind,
    SPREADSHEET_CONTENT_TYPE, XML_CONTENT_TYPE,
};
pub use config::{Config, ConfigError, SheetLabels, WebhookConfig};
pub use database::Database;
pub use error::{ExportError, ExportResult};
pub use listing::{sort_cases, CaseFilter, SortDirection, SortKey};
pub use model::{
    CaseUpdate, ExecutionType, Importance, NewTestCase, NewTestStep, ParseEnumError, Project,
    Status, StepUpdate, SuiteInfo, TestCase, TestStep, TestSuite,
};
pub use service::{ExportFormat, ExportService, ForwardReceipt};
pub use sheet::{SheetColumn, SheetRow, COLUMNS, SHEET_NAME};
pub use validation::{validate_case, validate_suite, Diagnostic, DiagnosticLevel};
pub use webhook::{Forwarder, HttpForwarder, WebhookError, WebhookPayload};
pub use xml::{escape_xml, render_generic, render_testlink, summarize, XmlError, XmlSummary};
