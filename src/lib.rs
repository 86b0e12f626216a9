//! # docgrade
//!
//! Grade student documents with a large language model.
//!
//! A client uploads a PDF or DOCX file together with a short description of
//! the assignment. The service extracts the document's text, asks a chat
//! model to grade it against the criteria, and returns the model's
//! structured evaluation.
//!
//! ## Pipeline Overview
//!
//! ```text
//! multipart upload
//!  │
//!  ├─ 1. Upload   persist to a self-deleting scratch file
//!  ├─ 2. Extract  pdf-extract / docx-rs (CPU-bound, spawn_blocking)
//!  ├─ 3. Prompt   fixed system persona + assignment + document text
//!  ├─ 4. Model    one chat-completion call (OpenAI-compatible or Anthropic)
//!  ├─ 5. Parse    first '{' .. last '}' → validated Evaluation
//!  └─ 6. Cleanup  scratch file removed on every path
//! ```
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use docgrade::{Assignment, Grader, GraderConfig};
//! use std::path::Path;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let config = GraderConfig::builder().api_key("sk-...").build()?;
//!     let grader = Grader::from_config(config)?;
//!     let assignment = Assignment {
//!         title: "Spring essay".into(),
//!         subject: "English".into(),
//!         instructions: "Describe spring in 300 words".into(),
//!         criteria: "Clarity, vocabulary, structure".into(),
//!     };
//!     let eval = grader.grade_path(Path::new("essay.docx"), assignment).await?;
//!     println!("{}: {}", eval.score, eval.feedback);
//!     Ok(())
//! }
//! ```
//!
//! ## Feature Flags
//!
//! | Feature | Default | Description |
//! |---------|---------|-------------|
//! | `cli`   | on      | Enables the `docgrade` binary (clap + anyhow + tracing-subscriber + dotenvy) |
//!
//! Disable `cli` when embedding the library or the router:
//! ```toml
//! docgrade = { version = "0.1", default-features = false }
//! ```

// ── Modules ──────────────────────────────────────────────────────────────

pub mod config;
pub mod error;
pub mod grade;
pub mod model;
pub mod output;
pub mod pipeline;
pub mod prompts;
pub mod server;

// ── Re-exports ───────────────────────────────────────────────────────────

pub use config::{GraderConfig, GraderConfigBuilder, ModelProvider};
pub use error::GradeError;
pub use grade::{Assignment, Grader, GradingRequest, Upload};
pub use model::{client_from_config, ModelClient};
pub use output::{Correction, Evaluation, Score};
pub use server::{router, serve, ServerState};
