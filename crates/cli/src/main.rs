mod render;

use clap::{Parser, Subcommand, ValueEnum};
use duplex_analyze::Analyzer;
use duplex_core::WorkflowId;
use std::path::{Path, PathBuf};
use std::process;

/// Output format for CLI responses.
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
enum OutputFormat {
    Text,
    Json,
}

/// duplex workflow protocol verifier.
#[derive(Parser)]
#[command(name = "duplex", version, about = "Two-party workflow protocol verifier")]
struct Cli {
    /// Output format (text or json)
    #[arg(long, global = true, default_value = "text", value_enum)]
    output: OutputFormat,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Verify every workflow protocol in a workflow-set file
    Analyze {
        /// Path to the workflow-set JSON file
        file: PathBuf,
    },

    /// Dump the expanded execution paths of one workflow
    Paths {
        /// Path to the workflow-set JSON file
        file: PathBuf,
        /// Workflow id to expand
        #[arg(long)]
        workflow: String,
    },
}

fn main() {
    init_tracing();

    let cli = Cli::parse();
    let code = match cli.command {
        Commands::Analyze { file } => run_analyze(&file, cli.output),
        Commands::Paths { file, workflow } => run_paths(&file, &workflow, cli.output),
    };
    process::exit(code);
}

fn init_tracing() {
    let env_filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("warn"));
    tracing_subscriber::fmt()
        .with_env_filter(env_filter)
        .with_writer(std::io::stderr)
        .init();
}

fn load_document(path: &Path) -> Result<serde_json::Value, String> {
    let text = std::fs::read_to_string(path)
        .map_err(|e| format!("cannot read {}: {}", path.display(), e))?;
    serde_json::from_str(&text)
        .map_err(|e| format!("{} is not valid JSON: {}", path.display(), e))
}

fn run_analyze(file: &Path, output: OutputFormat) -> i32 {
    let doc = match load_document(file) {
        Ok(doc) => doc,
        Err(err) => {
            eprintln!("error: {}", err);
            return 2;
        }
    };

    let report = match duplex_analyze::analyze(&doc) {
        Ok(report) => report,
        Err(err) => {
            eprintln!("error: {}", err);
            return 2;
        }
    };

    match output {
        OutputFormat::Json => match serde_json::to_string_pretty(&report) {
            Ok(json) => println!("{}", json),
            Err(err) => {
                eprintln!("error: cannot serialize report: {}", err);
                return 2;
            }
        },
        OutputFormat::Text => print!("{}", render::report_text(&report)),
    }

    if report.all_valid() {
        0
    } else {
        1
    }
}

fn run_paths(file: &Path, workflow: &str, output: OutputFormat) -> i32 {
    let doc = match load_document(file) {
        Ok(doc) => doc,
        Err(err) => {
            eprintln!("error: {}", err);
            return 2;
        }
    };

    let set = match duplex_interchange::from_workflow_set(&doc) {
        Ok(set) => set,
        Err(err) => {
            eprintln!("error: {}", err);
            return 2;
        }
    };

    let mut analyzer = Analyzer::new(&set);
    if let Err(err) = analyzer.analyze_all() {
        eprintln!("error: {}", err);
        return 2;
    }

    let id = WorkflowId(workflow.to_string());
    let Some(result) = analyzer.result(&id) else {
        eprintln!("error: no analysis result for workflow '{}'", workflow);
        return 2;
    };

    let rows = duplex_analyze::combination_rows(&result.combinations);
    match output {
        OutputFormat::Json => {
            let value = serde_json::json!({
                "workflow": workflow,
                "combination_count": rows.len(),
                "truncated": result.combinations.truncated(),
                "paths": rows,
            });
            match serde_json::to_string_pretty(&value) {
                Ok(json) => println!("{}", json),
                Err(err) => {
                    eprintln!("error: cannot serialize paths: {}", err);
                    return 2;
                }
            }
        }
        OutputFormat::Text => print!(
            "{}",
            render::paths_text(workflow, &rows, result.combinations.truncated())
        ),
    }

    0
}
