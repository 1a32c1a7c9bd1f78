use std::{
    io::{self, BufRead, Write},
    path::{Path, PathBuf},
    sync::Arc,
};

use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand};
use paradox_engine::{render_report, ParadoxPipeline, PipelineConfig, PipelineTelemetry};
use paradox_oracle_http::{list_model_configs, load_model_config, ChatClient, HttpOracle};
use shared_event_bus::FileEventPublisher;
use shared_logging::LogLevel;
use tokio::runtime::Runtime;

#[derive(Parser, Debug)]
#[command(name = "pdx", version, about = "Paradox Machine: staged paradox detection for claims and design decisions")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Runs the full analysis pipeline on a statement.
    Analyze(AnalyzeArgs),
    /// Direct model Q&A without the pipeline, for comparison.
    Ask(AskArgs),
    /// Lists available model configs.
    Models {
        /// Directory holding model config TOML files.
        #[arg(long, default_value = "assets/models")]
        dir: PathBuf,
    },
}

#[derive(Parser, Debug)]
struct AnalyzeArgs {
    /// Statement or proposal to inspect. Read from stdin when omitted.
    statement: Vec<String>,
    /// Model config name or path, e.g. deepseek-chat or assets/models/deepseek-chat.toml.
    #[arg(long)]
    config: Option<String>,
    /// Directory holding model config TOML files.
    #[arg(long)]
    models_dir: Option<PathBuf>,
    /// Output language for report prose (e.g. Chinese). Model default when omitted.
    #[arg(long)]
    lang: Option<String>,
    /// Print the structured JSON report instead of formatted text.
    #[arg(long)]
    json: bool,
    /// Iteration count handed to the time-scaling probe.
    #[arg(long, default_value_t = 1000)]
    iterations: u64,
    /// JSON-lines log file for pipeline telemetry.
    #[arg(long)]
    log_file: Option<PathBuf>,
    /// Minimum level written to the log file.
    #[arg(long, default_value = "info")]
    log_level: LogLevel,
    /// JSON-lines event log for pipeline stage events.
    #[arg(long)]
    event_log: Option<PathBuf>,
}

#[derive(Parser, Debug)]
struct AskArgs {
    /// Question for a direct model response. Read from stdin when omitted.
    question: Vec<String>,
    /// Model config name or path.
    #[arg(long)]
    config: Option<String>,
    /// Directory holding model config TOML files.
    #[arg(long)]
    models_dir: Option<PathBuf>,
    /// Custom system prompt.
    #[arg(long)]
    system: Option<String>,
    /// Override sampling temperature.
    #[arg(long)]
    temperature: Option<f64>,
    /// Print JSON output instead of plain answer text.
    #[arg(long)]
    json: bool,
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    let runtime = Runtime::new().context("starting tokio runtime")?;
    match cli.command {
        Commands::Analyze(args) => runtime.block_on(run_analyze(args)),
        Commands::Ask(args) => runtime.block_on(run_ask(args)),
        Commands::Models { dir } => run_models(&dir),
    }
}

async fn run_analyze(args: AnalyzeArgs) -> Result<()> {
    let statement = read_input(&args.statement, "Statement to examine: ")?;
    if statement.is_empty() {
        bail!("input statement cannot be empty");
    }

    let config = load_model_config(args.config.as_deref(), args.models_dir.as_deref())?;
    let oracle = Arc::new(HttpOracle::new(config)?.with_output_language(args.lang));
    let telemetry = build_telemetry(args.log_file, args.log_level, args.event_log)?;

    let pipeline = ParadoxPipeline::new(
        oracle,
        PipelineConfig {
            time_scale_iterations: args.iterations,
        },
        telemetry,
    );
    let report = pipeline.analyze(&statement).await?;

    if args.json {
        println!("{}", serde_json::to_string_pretty(&report)?);
    } else {
        println!("{}", render_report(&report));
    }
    Ok(())
}

async fn run_ask(args: AskArgs) -> Result<()> {
    let question = read_input(&args.question, "Question: ")?;
    if question.is_empty() {
        bail!("input question cannot be empty");
    }

    let config = load_model_config(args.config.as_deref(), args.models_dir.as_deref())?;
    let client = ChatClient::new(config)?;
    let system = args.system.unwrap_or_else(|| {
        "You are a general assistant. Respond directly, clearly, and rigorously.".into()
    });
    let answer = client.chat(&system, &question, args.temperature).await?;

    if args.json {
        println!(
            "{}",
            serde_json::to_string_pretty(&serde_json::json!({
                "provider": client.provider(),
                "model": client.model(),
                "question": question,
                "answer": answer,
            }))?
        );
    } else {
        println!("{answer}");
    }
    Ok(())
}

fn run_models(dir: &Path) -> Result<()> {
    let configs = list_model_configs(dir);
    if configs.is_empty() {
        println!("no model configs under {}", dir.display());
    } else {
        for name in configs {
            println!("{name}");
        }
    }
    Ok(())
}

fn read_input(parts: &[String], prompt: &str) -> Result<String> {
    if !parts.is_empty() {
        return Ok(parts.join(" ").trim().to_owned());
    }
    print!("{prompt}");
    io::stdout().flush()?;
    let mut line = String::new();
    io::stdin()
        .lock()
        .read_line(&mut line)
        .context("reading from stdin")?;
    Ok(line.trim().to_owned())
}

fn build_telemetry(
    log_file: Option<PathBuf>,
    log_level: LogLevel,
    event_log: Option<PathBuf>,
) -> Result<Option<PipelineTelemetry>> {
    if log_file.is_none() && event_log.is_none() {
        return Ok(None);
    }
    let mut builder = PipelineTelemetry::builder("pdx").min_level(log_level);
    if let Some(path) = log_file {
        builder = builder.log_path(path);
    }
    if let Some(path) = event_log {
        builder = builder.event_publisher(Arc::new(FileEventPublisher::new(path)?));
    }
    Ok(Some(builder.build()?))
}
