//! CLI binary for docgrade.
//!
//! A thin shim over the library crate that maps CLI flags and environment
//! variables to `GraderConfig`, then either serves the HTTP API or grades a
//! single local file.

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use docgrade::{Assignment, Evaluation, Grader, GraderConfig, ModelProvider};
use std::io;
use std::net::SocketAddr;
use std::path::PathBuf;
use tracing_subscriber::EnvFilter;

const AFTER_HELP: &str = r#"EXAMPLES:
  # Run the HTTP service on the default address
  docgrade serve

  # Grade a local document and print the evaluation as JSON
  docgrade grade essay.docx --title "Spring" --subject English \
      --instructions "Describe spring in 300 words" --criteria "Clarity, structure"

  # Use an OpenAI-compatible host (OpenRouter) with its attribution header
  docgrade --base-url https://openrouter.ai/api/v1 --model openai/gpt-4o-mini \
      --vendor-header "X-Title: docgrade" serve

  # Use Anthropic
  docgrade --provider anthropic --model claude-3-5-haiku-latest serve

HTTP API:
  POST /api/evaluate   multipart form: file, assignmentTitle, subject,
                       instructions, criteria  (alias: /api/grade)
  GET  /health         liveness check, answers "OK"

ENVIRONMENT VARIABLES:
  API_KEY                  Model API key
  API_BASE_URL             Base URL of the model host (API_ENDPOINT also accepted)
  MODEL_NAME               Model identifier
  MODEL_PROVIDER           openai | anthropic
  COMPLETION_PATH          Path appended to the base URL
  TEMPERATURE              Sampling temperature (0.0–2.0)
  MAX_TOKENS               Cap on generated tokens
  STRICT_FIELD_VALIDATION  Require instructions and criteria
  SCRATCH_DIR              Directory for in-flight uploads
  BIND_ADDR                Listen address for `serve`
  MAX_UPLOAD_BYTES         Largest accepted request body
  API_TIMEOUT_SECS         Model call timeout
  VENDOR_HEADER            One extra "Name: value" header (repeat --vendor-header for more)
  RUST_LOG                 Log filter, overrides --verbose/--quiet

A .env file in the working directory is loaded first when present.
"#;

/// Grade PDF and DOCX assignments with an LLM.
#[derive(Parser, Debug)]
#[command(
    name = "docgrade",
    version,
    about = "Grade PDF and DOCX assignments with an LLM",
    long_about = "Extract the text of an uploaded PDF or DOCX document, ask a chat model to \
grade it against the assignment's instructions and criteria, and return a structured JSON \
evaluation. Speaks the OpenAI chat-completions protocol (OpenAI, OpenRouter, Groq, Ollama, \
vLLM, ...) and the Anthropic Messages API.",
    arg_required_else_help = true,
    color = clap::ColorChoice::Auto,
    after_long_help = AFTER_HELP
)]
struct Cli {
    #[command(subcommand)]
    command: Command,

    /// Model API key.
    #[arg(long, global = true, env = "API_KEY", hide_env_values = true)]
    api_key: Option<String>,

    /// Base URL of the model host (e.g. https://api.openai.com/v1).
    #[arg(long, global = true, env = "API_BASE_URL")]
    base_url: Option<String>,

    /// Older name for the base URL; used only when API_BASE_URL is unset.
    #[arg(long, global = true, env = "API_ENDPOINT", hide = true)]
    api_endpoint: Option<String>,

    /// Model identifier (e.g. gpt-4o-mini, claude-3-5-haiku-latest).
    #[arg(long, global = true, env = "MODEL_NAME")]
    model: Option<String>,

    /// Wire protocol of the model host: openai, anthropic.
    #[arg(long, global = true, env = "MODEL_PROVIDER", default_value = "openai")]
    provider: String,

    /// Completion path appended to the base URL.
    #[arg(long, global = true, env = "COMPLETION_PATH")]
    completion_path: Option<String>,

    /// Sampling temperature (0.0–2.0).
    #[arg(long, global = true, env = "TEMPERATURE", default_value_t = 0.3)]
    temperature: f32,

    /// Cap on generated tokens.
    #[arg(long, global = true, env = "MAX_TOKENS")]
    max_tokens: Option<u32>,

    /// Extra header sent with every model call, as "Name: value". Repeatable.
    /// Values may contain commas.
    #[arg(long, global = true, env = "VENDOR_HEADER")]
    vendor_header: Vec<String>,

    /// Model call timeout in seconds.
    #[arg(long, global = true, env = "API_TIMEOUT_SECS")]
    api_timeout: Option<u64>,

    /// Reject requests whose instructions or criteria are blank.
    #[arg(long, global = true, env = "STRICT_FIELD_VALIDATION")]
    strict: bool,

    /// Directory for in-flight uploads.
    #[arg(long, global = true, env = "SCRATCH_DIR")]
    scratch_dir: Option<PathBuf>,

    /// Enable DEBUG-level tracing logs.
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Suppress all output except errors.
    #[arg(short, long, global = true)]
    quiet: bool,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Run the HTTP grading service.
    Serve {
        /// Listen address.
        #[arg(long, env = "BIND_ADDR", default_value = "0.0.0.0:3000")]
        bind: SocketAddr,

        /// Largest accepted request body in bytes.
        #[arg(long, env = "MAX_UPLOAD_BYTES", default_value_t = 20 * 1024 * 1024)]
        max_upload_bytes: usize,
    },

    /// Grade one local PDF or DOCX file and print the evaluation.
    Grade {
        /// Path to the document.
        file: PathBuf,

        /// Assignment title.
        #[arg(long, default_value = "")]
        title: String,

        /// Subject of the assignment.
        #[arg(long, default_value = "")]
        subject: String,

        /// Instructions given to the student.
        #[arg(long, default_value = "")]
        instructions: String,

        /// Grading criteria.
        #[arg(long, default_value = "")]
        criteria: String,

        /// Print a readable summary instead of JSON.
        #[arg(long)]
        text: bool,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    dotenvy::dotenv().ok();
    let cli = Cli::parse();

    // ── Logging setup ────────────────────────────────────────────────────
    let filter = if cli.verbose {
        "debug"
    } else if cli.quiet {
        "error"
    } else {
        "info"
    };
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(filter)),
        )
        .with_writer(io::stderr)
        .init();

    let config = build_config(&cli)?;
    tracing::debug!(?config, "Configuration loaded");
    let grader = Grader::from_config(config).context("Failed to create model client")?;

    match cli.command {
        Command::Serve { bind, .. } => {
            docgrade::serve(grader, bind)
                .await
                .with_context(|| format!("Server on {bind} failed"))?;
        }
        Command::Grade {
            file,
            title,
            subject,
            instructions,
            criteria,
            text,
        } => {
            let assignment = Assignment {
                title,
                subject,
                instructions,
                criteria,
            };
            let eval = grader
                .grade_path(&file, assignment)
                .await
                .with_context(|| format!("Grading {} failed", file.display()))?;

            if text {
                print_summary(&eval);
            } else {
                let json =
                    serde_json::to_string_pretty(&eval).context("Failed to serialise output")?;
                println!("{json}");
            }
        }
    }

    Ok(())
}

/// Map CLI args to `GraderConfig`.
fn build_config(cli: &Cli) -> Result<GraderConfig> {
    let provider: ModelProvider = cli.provider.parse().context("Invalid --provider")?;

    let mut builder = GraderConfig::builder()
        .provider(provider)
        .temperature(cli.temperature)
        .strict_field_validation(cli.strict);

    if let Some(key) = &cli.api_key {
        builder = builder.api_key(key);
    }
    if let Some(url) = cli.base_url.as_ref().or(cli.api_endpoint.as_ref()) {
        builder = builder.base_url(url);
    }
    if let Some(model) = &cli.model {
        builder = builder.model(model);
    }
    if let Some(path) = &cli.completion_path {
        builder = builder.completion_path(path);
    }
    if let Some(n) = cli.max_tokens {
        builder = builder.max_tokens(n);
    }
    if let Some(secs) = cli.api_timeout {
        builder = builder.api_timeout_secs(secs);
    }
    if let Some(dir) = &cli.scratch_dir {
        builder = builder.scratch_dir(dir);
    }
    for raw in &cli.vendor_header {
        let (name, value) = parse_vendor_header(raw)?;
        builder = builder.vendor_header(name, value);
    }
    if let Command::Serve {
        max_upload_bytes, ..
    } = &cli.command
    {
        builder = builder.max_upload_bytes(*max_upload_bytes);
    }

    builder.build().context("Invalid configuration")
}

/// Split `"Name: value"` into its trimmed halves.
fn parse_vendor_header(raw: &str) -> Result<(String, String)> {
    let (name, value) = raw
        .split_once(':')
        .with_context(|| format!("Vendor header '{raw}' must look like 'Name: value'"))?;
    let name = name.trim();
    if name.is_empty() {
        anyhow::bail!("Vendor header '{raw}' has an empty name");
    }
    Ok((name.to_string(), value.trim().to_string()))
}

fn print_summary(eval: &Evaluation) {
    println!("Score: {}", eval.score);
    println!();
    println!("{}", eval.feedback);

    if !eval.strengths.is_empty() {
        println!();
        println!("Strengths:");
        for s in &eval.strengths {
            println!("  + {s}");
        }
    }
    if !eval.weaknesses.is_empty() {
        println!();
        println!("Weaknesses:");
        for w in &eval.weaknesses {
            println!("  - {w}");
        }
    }
    if let Some(corrections) = &eval.detailed_corrections {
        println!();
        println!("Corrections:");
        for c in corrections {
            println!("  \"{}\" → \"{}\"", c.original, c.correction);
            if !c.explanation.is_empty() {
                println!("      {}", c.explanation);
            }
        }
    }
}
