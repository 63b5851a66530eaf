use anyhow::anyhow;
use casework_core::{
    parse_id, sheet, sort_cases, summarize, validate_case, validate_suite, Api, ApiError,
    CaseFilter, CaseUpdate, Config, Database, Diagnostic, DiagnosticLevel, ExecutionType,
    ExportArtifact, ExportService, Importance, NewTestCase, NewTestStep, SortDirection, SortKey,
    Status, StepUpdate, TestCase, TestStep, TestSuite,
};
use clap::{Args, Parser, Subcommand, ValueEnum};
use comfy_table::{presets::ASCII_FULL, Table};
use serde::Serialize;
use serde_json::json;
use std::fs;
use std::path::PathBuf;
use time::format_description::well_known::Rfc3339;
use time::OffsetDateTime;

#[derive(Debug, Parser)]
#[command(author, version, about = "Casework test case catalog and export command line interface")]
struct CaseworkCli {
    /// Path to the YAML configuration file (defaults apply when it is missing)
    #[arg(long, global = true, default_value = "casework.yaml")]
    config: PathBuf,
    /// Override the SQLite database path from the configuration
    #[arg(long, global = true)]
    database: Option<PathBuf>,
    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Manage projects
    Project {
        #[command(subcommand)]
        command: ProjectCommand,
    },
    /// Manage test suites
    Suite {
        #[command(subcommand)]
        command: SuiteCommand,
    },
    /// Manage test cases
    Case {
        #[command(subcommand)]
        command: CaseCommand,
    },
    /// Manage test steps
    Step {
        #[command(subcommand)]
        command: StepCommand,
    },
    /// Generate, inspect and forward exports
    Export {
        #[command(subcommand)]
        command: ExportCommand,
    },
}

#[derive(Debug, Subcommand)]
enum ProjectCommand {
    /// Create a project
    Add {
        name: String,
        #[arg(long)]
        json: bool,
    },
}

#[derive(Debug, Subcommand)]
enum SuiteCommand {
    /// Create a test suite inside a project
    Add {
        #[arg(long)]
        project: Option<String>,
        name: String,
        /// Parent test suite id
        #[arg(long)]
        parent: Option<String>,
        #[arg(long)]
        json: bool,
    },
    /// List the test suites of a project
    List {
        #[arg(long)]
        project: Option<String>,
        #[arg(long)]
        json: bool,
    },
    /// Show the project and suite names used by exports
    Info {
        #[arg(long)]
        suite: Option<String>,
        #[arg(long)]
        json: bool,
    },
}

#[derive(Debug, Args)]
struct CaseFields {
    #[arg(long)]
    title: String,
    #[arg(long, default_value = "")]
    summary: String,
    #[arg(long, default_value = "")]
    precondition: String,
    #[arg(long, default_value = "")]
    postcondition: String,
    #[arg(long, default_value_t = Status::NotRun)]
    status: Status,
    #[arg(long, default_value_t = Importance::Medium)]
    importance: Importance,
    #[arg(long, default_value_t = ExecutionType::Manual)]
    execution_type: ExecutionType,
    #[arg(long)]
    manual_edit: bool,
}

#[derive(Debug, Subcommand)]
enum CaseCommand {
    /// Create a test case
    Add {
        #[arg(long)]
        suite: Option<String>,
        #[arg(long)]
        user_story: Option<i64>,
        #[command(flatten)]
        fields: CaseFields,
        #[arg(long)]
        json: bool,
    },
    /// Show a test case with its steps
    Show {
        #[arg(long)]
        id: Option<String>,
        #[arg(long)]
        json: bool,
    },
    /// List the test cases of a suite
    List {
        #[arg(long)]
        suite: Option<String>,
        /// Case-insensitive match on title and summary
        #[arg(long)]
        search: Option<String>,
        #[arg(long)]
        status: Option<Status>,
        #[arg(long, value_enum, default_value_t = SortArg::Id)]
        sort: SortArg,
        /// Sort in descending order
        #[arg(long)]
        desc: bool,
        #[arg(long)]
        json: bool,
    },
    /// Replace the editable fields of a test case
    Update {
        #[arg(long)]
        id: Option<String>,
        #[command(flatten)]
        fields: CaseFields,
        #[arg(long)]
        json: bool,
    },
    /// Delete a test case and its steps
    Delete {
        #[arg(long)]
        id: Option<String>,
        #[arg(long)]
        json: bool,
    },
    /// Report problems that affect exports (one case with --id, or a whole suite)
    Check {
        #[arg(long, conflicts_with = "suite")]
        id: Option<String>,
        #[arg(long)]
        suite: Option<String>,
        #[arg(long)]
        json: bool,
    },
}

#[derive(Debug, Args)]
struct StepFields {
    #[arg(long, allow_hyphen_values = true)]
    number: i64,
    #[arg(long)]
    action: String,
    #[arg(long, default_value = "")]
    expected: String,
    #[arg(long, default_value_t = ExecutionType::Manual)]
    execution_type: ExecutionType,
}

#[derive(Debug, Subcommand)]
enum StepCommand {
    /// Append a step to a test case
    Add {
        #[arg(long = "case")]
        case_id: Option<String>,
        #[command(flatten)]
        fields: StepFields,
        #[arg(long)]
        json: bool,
    },
    Show {
        #[arg(long)]
        id: Option<String>,
        #[arg(long)]
        json: bool,
    },
    Update {
        #[arg(long)]
        id: Option<String>,
        #[command(flatten)]
        fields: StepFields,
        #[arg(long)]
        json: bool,
    },
    Delete {
        #[arg(long)]
        id: Option<String>,
        #[arg(long)]
        json: bool,
    },
}

#[derive(Debug, Subcommand)]
enum ExportCommand {
    /// Generate a generic <testcases> XML export
    Xml {
        #[arg(long)]
        suite: Option<String>,
        #[arg(long)]
        json: bool,
    },
    /// Generate a TestLink <testsuite> XML export
    Testlink {
        #[arg(long)]
        suite: Option<String>,
        #[arg(long)]
        json: bool,
    },
    /// Generate a spreadsheet export
    Excel {
        #[arg(long)]
        suite: Option<String>,
        #[arg(long)]
        json: bool,
    },
    /// List the exports of a suite, newest first
    List {
        #[arg(long)]
        suite: Option<String>,
        #[arg(long)]
        json: bool,
    },
    /// Describe a stored export
    Show {
        #[arg(long)]
        id: Option<String>,
        #[arg(long)]
        json: bool,
    },
    /// Write the payload of a stored export to disk
    Download {
        #[arg(long)]
        id: Option<String>,
        /// Destination path (defaults to the configured download filename)
        #[arg(long)]
        output: Option<PathBuf>,
        /// Download the XML payload instead of the workbook
        #[arg(long)]
        xml: bool,
    },
    /// Send selected test cases to the automation webhook
    Forward {
        #[arg(long)]
        suite: Option<String>,
        /// Test case id to include. Repeat for multiple cases.
        #[arg(long = "case")]
        cases: Vec<i64>,
        #[arg(long)]
        json: bool,
    },
    /// Print the spreadsheet rows of a suite without storing anything
    Preview {
        #[arg(long)]
        suite: Option<String>,
        #[arg(long)]
        json: bool,
    },
}

#[derive(Debug, Clone, Copy, ValueEnum)]
enum SortArg {
    Id,
    Title,
    Status,
    Importance,
    Created,
    Updated,
}

impl From<SortArg> for SortKey {
    fn from(value: SortArg) -> Self {
        match value {
            SortArg::Id => SortKey::Id,
            SortArg::Title => SortKey::Title,
            SortArg::Status => SortKey::Status,
            SortArg::Importance => SortKey::Importance,
            SortArg::Created => SortKey::CreatedAt,
            SortArg::Updated => SortKey::UpdatedAt,
        }
    }
}

fn main() -> anyhow::Result<()> {
    env_logger::init();
    let cli = CaseworkCli::parse();
    let api = open_api(&cli)?;

    match cli.command {
        Command::Project { command } => run_project(&api, command),
        Command::Suite { command } => run_suite(&api, command),
        Command::Case { command } => run_case(&api, command),
        Command::Step { command } => run_step(&api, command),
        Command::Export { command } => run_export(&api, command),
    }
}

fn open_api(cli: &CaseworkCli) -> anyhow::Result<Api> {
    let mut config = Config::load(Some(cli.config.as_path()))?;
    if let Some(path) = &cli.database {
        config.database_path = path.clone();
    }
    log::debug!(
        "using database {:?}, webhook {}",
        config.database_path,
        config.webhook.endpoint
    );
    let db = Database::open(&config.database_path)?;
    Ok(Api::new(ExportService::new(db, config)))
}

/// Prints the error body the way an HTTP client would receive it and turns
/// the failure into a non-zero exit.
fn fail(err: ApiError) -> anyhow::Error {
    match serde_json::to_string_pretty(&err.body) {
        Ok(body) => eprintln!("{body}"),
        Err(_) => eprintln!("{}", err.body.error),
    }
    anyhow!("request failed with status {}", err.status)
}

fn print_json<T: Serialize + ?Sized>(value: &T) -> anyhow::Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

fn run_project(api: &Api, command: ProjectCommand) -> anyhow::Result<()> {
    match command {
        ProjectCommand::Add { name, json } => {
            let project = api
                .catalog("Failed to create project", |db| db.create_project(&name))
                .map_err(fail)?;
            if json {
                print_json(&project)?;
            } else {
                println!("created project {} ({})", project.id, project.name);
            }
        }
    }
    Ok(())
}

fn run_suite(api: &Api, command: SuiteCommand) -> anyhow::Result<()> {
    match command {
        SuiteCommand::Add {
            project,
            name,
            parent,
            json,
        } => {
            let suite = api
                .catalog("Failed to create test suite", |db| {
                    let project_id = parse_id(project.as_deref(), "project_id")?;
                    let parent_id = parent
                        .as_deref()
                        .map(|raw| parse_id(Some(raw), "parent_suite_id"))
                        .transpose()?;
                    db.create_suite(project_id, &name, parent_id)
                })
                .map_err(fail)?;
            if json {
                print_json(&suite)?;
            } else {
                println!("created test suite {} ({})", suite.id, suite.name);
            }
        }
        SuiteCommand::List { project, json } => {
            let suites = api
                .catalog("Failed to fetch test suites", |db| {
                    db.list_suites(parse_id(project.as_deref(), "project_id")?)
                })
                .map_err(fail)?;
            if json {
                print_json(&suites)?;
            } else {
                println!("{}", suite_table(&suites));
            }
        }
        SuiteCommand::Info { suite, json } => {
            let info = api
                .catalog("Failed to fetch test suite", |db| {
                    db.suite_info(parse_id(suite.as_deref(), "test_suite_id")?)
                })
                .map_err(fail)?;
            if json {
                print_json(&info)?;
            } else {
                println!("Project    : {} ({})", info.project_name, info.project_id);
                println!("Test suite : {} ({})", info.test_suite_name, info.test_suite_id);
            }
        }
    }
    Ok(())
}

fn run_case(api: &Api, command: CaseCommand) -> anyhow::Result<()> {
    match command {
        CaseCommand::Add {
            suite,
            user_story,
            fields,
            json,
        } => {
            let case = api
                .catalog("Failed to create test case", |db| {
                    let new_case = NewTestCase {
                        test_suite_id: parse_id(suite.as_deref(), "test_suite_id")?,
                        user_story_id: user_story,
                        title: fields.title,
                        summary: fields.summary,
                        precondition: fields.precondition,
                        postcondition: fields.postcondition,
                        status: fields.status,
                        manual_edit: fields.manual_edit,
                        importance: fields.importance,
                        execution_type: fields.execution_type,
                    };
                    db.create_case(&new_case)
                })
                .map_err(fail)?;
            output_case(&case, json)?;
        }
        CaseCommand::Show { id, json } => {
            let case = api
                .catalog("Failed to fetch test case", |db| {
                    db.get_case(parse_id(id.as_deref(), "id")?)
                })
                .map_err(fail)?;
            output_case(&case, json)?;
        }
        CaseCommand::List {
            suite,
            search,
            status,
            sort,
            desc,
            json,
        } => {
            let cases = api
                .catalog("Failed to fetch test cases", |db| {
                    db.list_cases(parse_id(suite.as_deref(), "test_suite_id")?)
                })
                .map_err(fail)?;
            let filter = CaseFilter { search, status };
            let mut cases = filter.apply(cases);
            let direction = if desc {
                SortDirection::Desc
            } else {
                SortDirection::Asc
            };
            sort_cases(&mut cases, sort.into(), direction);
            if json {
                print_json(&cases)?;
            } else {
                println!("{}", case_table(&cases));
            }
        }
        CaseCommand::Update { id, fields, json } => {
            let case = api
                .catalog("Failed to update test case", |db| {
                    let update = CaseUpdate {
                        title: fields.title,
                        summary: fields.summary,
                        precondition: fields.precondition,
                        postcondition: fields.postcondition,
                        status: fields.status,
                        manual_edit: fields.manual_edit,
                        importance: fields.importance,
                        execution_type: fields.execution_type,
                    };
                    db.update_case(parse_id(id.as_deref(), "id")?, &update)
                })
                .map_err(fail)?;
            output_case(&case, json)?;
        }
        CaseCommand::Delete { id, json } => {
            let case = api
                .catalog("Failed to delete test case", |db| {
                    db.delete_case(parse_id(id.as_deref(), "id")?)
                })
                .map_err(fail)?;
            if json {
                print_json(&json!({ "message": "Test case deleted", "test_case": case }))?;
            } else {
                println!(
                    "deleted test case {} ({}) and {} step(s)",
                    case.id,
                    case.title,
                    case.test_steps.len()
                );
            }
        }
        CaseCommand::Check { id, suite, json } => {
            let diagnostics = match suite {
                Some(raw) => {
                    let cases = api
                        .catalog("Failed to fetch test cases", |db| {
                            db.list_cases(parse_id(Some(raw.as_str()), "test_suite_id")?)
                        })
                        .map_err(fail)?;
                    validate_suite(&cases)
                }
                None => {
                    let case = api
                        .catalog("Failed to fetch test case", |db| {
                            db.get_case(parse_id(id.as_deref(), "id")?)
                        })
                        .map_err(fail)?;
                    validate_case(&case)
                }
            };
            let has_errors = diagnostics.iter().any(Diagnostic::is_error);
            if json {
                print_json(&json!({ "diagnostics": diagnostics, "ok": !has_errors }))?;
            } else if diagnostics.is_empty() {
                println!("no problems found");
            } else {
                print_diagnostics(&diagnostics);
            }
            if has_errors {
                anyhow::bail!("validation failed");
            }
        }
    }
    Ok(())
}

fn run_step(api: &Api, command: StepCommand) -> anyhow::Result<()> {
    let (step, json) = match command {
        StepCommand::Add {
            case_id,
            fields,
            json,
        } => {
            let step = api
                .catalog("Failed to create test step", |db| {
                    let new_step = NewTestStep {
                        test_case_id: parse_id(case_id.as_deref(), "test_case_id")?,
                        step_number: fields.number,
                        step_action: fields.action,
                        expected_result: fields.expected,
                        execution_type: fields.execution_type,
                    };
                    db.create_step(&new_step)
                })
                .map_err(fail)?;
            (step, json)
        }
        StepCommand::Show { id, json } => {
            let step = api
                .catalog("Failed to fetch test step", |db| {
                    db.get_step(parse_id(id.as_deref(), "id")?)
                })
                .map_err(fail)?;
            (step, json)
        }
        StepCommand::Update { id, fields, json } => {
            let step = api
                .catalog("Failed to update test step", |db| {
                    let update = StepUpdate {
                        step_number: fields.number,
                        step_action: fields.action,
                        expected_result: fields.expected,
                        execution_type: fields.execution_type,
                    };
                    db.update_step(parse_id(id.as_deref(), "id")?, &update)
                })
                .map_err(fail)?;
            (step, json)
        }
        StepCommand::Delete { id, json } => {
            let step = api
                .catalog("Failed to delete test step", |db| {
                    db.delete_step(parse_id(id.as_deref(), "id")?)
                })
                .map_err(fail)?;
            if json {
                print_json(&json!({ "message": "Test step deleted", "test_step": step }))?;
            } else {
                println!("deleted step {} of test case {}", step.id, step.test_case_id);
            }
            return Ok(());
        }
    };

    if json {
        print_json(&step)?;
    } else {
        println!("{}", step_table(std::slice::from_ref(&step)));
    }
    Ok(())
}

fn run_export(api: &Api, command: ExportCommand) -> anyhow::Result<()> {
    match command {
        ExportCommand::Xml { suite, json } => {
            let artifact = api.generate_xml(suite.as_deref()).map_err(fail)?;
            output_created(&artifact, json)?;
        }
        ExportCommand::Testlink { suite, json } => {
            let artifact = api.generate_testlink_xml(suite.as_deref()).map_err(fail)?;
            output_created(&artifact, json)?;
        }
        ExportCommand::Excel { suite, json } => {
            let artifact = api.generate_spreadsheet(suite.as_deref()).map_err(fail)?;
            output_created(&artifact, json)?;
        }
        ExportCommand::List { suite, json } => {
            let exports = api.list_exports(suite.as_deref()).map_err(fail)?;
            if json {
                print_json(&exports)?;
            } else {
                println!("{}", export_table(&exports));
            }
        }
        ExportCommand::Show { id, json } => {
            let artifact = api.get_export(id.as_deref()).map_err(fail)?;
            let summary = if artifact.xml_file.is_empty() {
                None
            } else {
                Some(summarize(&artifact.xml_file).map_err(|err| {
                    anyhow!("stored XML of export {} is unreadable: {err}", artifact.id)
                })?)
            };
            if json {
                print_json(&json!({
                    "id": artifact.id,
                    "test_suite_id": artifact.test_suite_id,
                    "kind": artifact.kind(),
                    "created_at": format_time(artifact.created_at),
                    "xml": summary,
                    "spreadsheet_base64_len": artifact.excel_file_path.as_ref().map(String::len),
                }))?;
            } else {
                println!("Export     : {}", artifact.id);
                println!("Test suite : {}", artifact.test_suite_id);
                println!("Kind       : {}", artifact.kind());
                println!("Created    : {}", format_time(artifact.created_at));
                if let Some(summary) = summary {
                    println!(
                        "XML        : <{}> with {} test case(s), {} step(s)",
                        summary.root, summary.testcases, summary.steps
                    );
                }
                if let Some(encoded) = &artifact.excel_file_path {
                    println!("Workbook   : {} base64 characters", encoded.len());
                }
            }
        }
        ExportCommand::Download { id, output, xml } => {
            let download = if xml {
                api.download_xml(id.as_deref())
            } else {
                api.download_spreadsheet(id.as_deref())
            }
            .map_err(fail)?;
            let path = output.unwrap_or_else(|| PathBuf::from(&download.filename));
            fs::write(&path, &download.bytes)?;
            println!(
                "wrote {} byte(s) to {} ({})",
                download.bytes.len(),
                path.display(),
                download.content_type
            );
        }
        ExportCommand::Forward { suite, cases, json } => {
            let receipt = api.forward(suite.as_deref(), &cases).map_err(fail)?;
            if json {
                print_json(&receipt)?;
            } else {
                println!("{}", receipt.message);
            }
        }
        ExportCommand::Preview { suite, json } => {
            let rows = api.preview_spreadsheet(suite.as_deref()).map_err(fail)?;
            if json {
                print_json(&rows)?;
            } else {
                println!("{}", sheet::preview(&rows));
            }
        }
    }
    Ok(())
}

fn output_created(artifact: &ExportArtifact, json: bool) -> anyhow::Result<()> {
    if json {
        print_json(artifact)?;
    } else {
        println!(
            "created {} export {} for test suite {} at {}",
            artifact.kind(),
            artifact.id,
            artifact.test_suite_id,
            format_time(artifact.created_at)
        );
    }
    Ok(())
}

fn output_case(case: &TestCase, json: bool) -> anyhow::Result<()> {
    if json {
        return print_json(case);
    }
    println!("Test case    : {} ({})", case.id, case.title);
    println!("Test suite   : {}", case.test_suite_id);
    println!("Status       : {}", case.status);
    println!("Importance   : {}", case.importance);
    println!("Execution    : {}", case.execution_type);
    if !case.summary.is_empty() {
        println!("Summary      : {}", case.summary);
    }
    if !case.precondition.is_empty() {
        println!("Precondition : {}", case.precondition);
    }
    if !case.postcondition.is_empty() {
        println!("Postcondition: {}", case.postcondition);
    }
    println!("Updated      : {}", format_time(case.updated_at));
    if !case.test_steps.is_empty() {
        println!("\n{}", step_table(&case.test_steps));
    }
    Ok(())
}

fn format_time(ts: OffsetDateTime) -> String {
    ts.format(&Rfc3339).unwrap_or_else(|_| ts.to_string())
}

fn new_table() -> Table {
    let mut table = Table::new();
    table.load_preset(ASCII_FULL);
    table
}

fn suite_table(suites: &[TestSuite]) -> Table {
    let mut table = new_table();
    table.set_header(vec!["ID", "Name", "Parent"]);
    for suite in suites {
        table.add_row(vec![
            suite.id.to_string(),
            suite.name.clone(),
            suite
                .parent_suite_id
                .map(|id| id.to_string())
                .unwrap_or_default(),
        ]);
    }
    table
}

fn case_table(cases: &[TestCase]) -> Table {
    let mut table = new_table();
    table.set_header(vec!["ID", "Title", "Status", "Importance", "Steps", "Updated"]);
    for case in cases {
        table.add_row(vec![
            case.id.to_string(),
            case.title.clone(),
            case.status.to_string(),
            case.importance.to_string(),
            case.test_steps.len().to_string(),
            format_time(case.updated_at),
        ]);
    }
    table
}

fn step_table(steps: &[TestStep]) -> Table {
    let mut table = new_table();
    table.set_header(vec!["ID", "#", "Action", "Expected result", "Execution"]);
    for step in steps {
        table.add_row(vec![
            step.id.to_string(),
            step.step_number.to_string(),
            step.step_action.clone(),
            step.expected_result.clone(),
            step.execution_type.to_string(),
        ]);
    }
    table
}

fn export_table(exports: &[ExportArtifact]) -> Table {
    let mut table = new_table();
    table.set_header(vec!["ID", "Kind", "Created"]);
    for artifact in exports {
        table.add_row(vec![
            artifact.id.to_string(),
            artifact.kind().to_string(),
            format_time(artifact.created_at),
        ]);
    }
    table
}

fn print_diagnostics(diagnostics: &[Diagnostic]) {
    println!("Diagnostics:");
    for diagnostic in diagnostics {
        let level = match diagnostic.level {
            DiagnosticLevel::Error => "error",
            DiagnosticLevel::Warning => "warn",
        };
        println!("  - [{level}] {}: {}", diagnostic.location, diagnostic.message);
    }
}
