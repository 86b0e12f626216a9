//! The grading orchestrator: one request in, one evaluation out.
//!
//! [`Grader::grade`] runs the pipeline strictly in order and stops at the
//! first failure:
//!
//! 1. ensure the scratch directory exists
//! 2. require a file (and, in strict mode, instructions and criteria)
//! 3. persist the upload to a scratch file
//! 4. extract text by file type and enforce the minimum length
//! 5. build the prompt and call the model
//! 6. parse and validate the evaluation from the reply
//! 7. delete the scratch file, whatever happened in 4–6
//!
//! Step 7 is carried by the [`ScratchFile`] guard, so it also runs when the
//! request future is dropped mid-flight.

use crate::config::{GraderConfig, MIN_EXTRACTED_CHARS};
use crate::error::GradeError;
use crate::model::{client_from_config, CompletionOptions, ModelClient};
use crate::output::Evaluation;
use crate::pipeline::extract::{extract_text, DocumentKind};
use crate::pipeline::parse::parse_evaluation;
use crate::pipeline::upload::{ensure_scratch_dir, ScratchFile};
use crate::prompts::build_conversation;
use std::path::Path;
use std::sync::Arc;
use std::time::Instant;
use tracing::{debug, info};

/// Descriptive fields of the assignment being graded.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Assignment {
    pub title: String,
    pub subject: String,
    pub instructions: String,
    pub criteria: String,
}

impl Assignment {
    /// Names of the strict-mode fields that are blank.
    pub fn missing_required(&self) -> Vec<&'static str> {
        let mut missing = Vec::new();
        if self.instructions.trim().is_empty() {
            missing.push("instructions");
        }
        if self.criteria.trim().is_empty() {
            missing.push("criteria");
        }
        missing
    }
}

/// An uploaded document: the client's filename and the raw bytes.
#[derive(Debug, Clone)]
pub struct Upload {
    pub filename: String,
    pub bytes: Vec<u8>,
}

/// Everything one grading call needs.
#[derive(Debug, Clone, Default)]
pub struct GradingRequest {
    pub assignment: Assignment,
    pub file: Option<Upload>,
}

/// Runs grading requests against one model client.
///
/// Holds no per-request state; share it behind an `Arc` between concurrent
/// requests.
#[derive(Clone)]
pub struct Grader {
    config: GraderConfig,
    client: Arc<dyn ModelClient>,
}

impl Grader {
    pub fn new(config: GraderConfig, client: Arc<dyn ModelClient>) -> Self {
        Self { config, client }
    }

    /// Build a grader with the client selected by `config.provider`.
    pub fn from_config(config: GraderConfig) -> Result<Self, GradeError> {
        let client = client_from_config(&config)?;
        Ok(Self::new(config, client))
    }

    pub fn config(&self) -> &GraderConfig {
        &self.config
    }

    /// Grade one uploaded document.
    pub async fn grade(&self, request: GradingRequest) -> Result<Evaluation, GradeError> {
        let total_start = Instant::now();

        // ── Step 1: Scratch directory ────────────────────────────────────
        ensure_scratch_dir(&self.config.scratch_dir).await?;

        // ── Step 2: Validate the request ─────────────────────────────────
        let upload = request.file.ok_or(GradeError::MissingFile)?;
        if self.config.strict_field_validation {
            let fields = request.assignment.missing_required();
            if !fields.is_empty() {
                return Err(GradeError::MissingFields { fields });
            }
        }
        info!(
            "Grading '{}' ({} bytes) for assignment '{}'",
            upload.filename,
            upload.bytes.len(),
            request.assignment.title
        );

        // ── Step 3: Persist upload ───────────────────────────────────────
        let scratch =
            ScratchFile::persist(&self.config.scratch_dir, &upload.filename, &upload.bytes)
                .await?;
        drop(upload.bytes);

        // ── Steps 4–6 ────────────────────────────────────────────────────
        let result = self
            .evaluate(&scratch, &upload.filename, &request.assignment, total_start)
            .await;

        // ── Step 7: Cleanup, on success and failure alike ────────────────
        scratch.remove().await;
        result
    }

    /// Grade a document already on disk.
    ///
    /// The file is copied into the scratch directory like an upload, so the
    /// cleanup contract is the same as for HTTP requests.
    pub async fn grade_path(
        &self,
        path: &Path,
        assignment: Assignment,
    ) -> Result<Evaluation, GradeError> {
        let bytes = tokio::fs::read(path)
            .await
            .map_err(|source| GradeError::Scratch {
                path: path.to_path_buf(),
                source,
            })?;
        let filename = path
            .file_name()
            .and_then(|n| n.to_str())
            .unwrap_or_default()
            .to_string();

        self.grade(GradingRequest {
            assignment,
            file: Some(Upload { filename, bytes }),
        })
        .await
    }

    async fn evaluate(
        &self,
        scratch: &ScratchFile,
        filename: &str,
        assignment: &Assignment,
        started: Instant,
    ) -> Result<Evaluation, GradeError> {
        // ── Step 4: Extract text ─────────────────────────────────────────
        let kind = DocumentKind::from_filename(filename)?;
        let extract_start = Instant::now();
        let text = extract_text(scratch.path(), kind).await?;
        let text = text.trim();
        let chars = text.chars().count();
        debug!(
            "Extracted {} chars from {} in {}ms",
            chars,
            kind,
            extract_start.elapsed().as_millis()
        );
        if chars < MIN_EXTRACTED_CHARS {
            return Err(GradeError::EmptyOrUnreadableDocument {
                chars,
                min: MIN_EXTRACTED_CHARS,
            });
        }

        // ── Step 5: Prompt + model call ──────────────────────────────────
        let conversation = build_conversation(assignment, text);
        let options = CompletionOptions::from_config(&self.config);
        let model_start = Instant::now();
        let reply = self.client.complete(&conversation, &options).await?;
        debug!(
            "{} replied with {} chars in {}ms",
            self.client.provider(),
            reply.len(),
            model_start.elapsed().as_millis()
        );

        // ── Step 6: Parse ────────────────────────────────────────────────
        let evaluation = parse_evaluation(&reply)?;
        info!(
            kind = kind.as_str(),
            chars,
            ms = started.elapsed().as_millis() as u64,
            "Graded '{}'",
            filename
        );
        Ok(evaluation)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::Conversation;
    use crate::output::Score;
    use async_trait::async_trait;
    use docx_rs::{Docx, Paragraph, Run};
    use std::io::Cursor;
    use std::sync::Mutex;
    use tempfile::TempDir;

    /// Replays a fixed outcome and records every conversation it receives.
    struct StubClient {
        reply: Result<String, (u16, String)>,
        seen: Mutex<Vec<Conversation>>,
    }

    impl StubClient {
        fn replying(reply: &str) -> Arc<Self> {
            Arc::new(Self {
                reply: Ok(reply.to_string()),
                seen: Mutex::new(Vec::new()),
            })
        }

        fn failing(status: u16, body: &str) -> Arc<Self> {
            Arc::new(Self {
                reply: Err((status, body.to_string())),
                seen: Mutex::new(Vec::new()),
            })
        }
    }

    #[async_trait]
    impl ModelClient for StubClient {
        async fn complete(
            &self,
            conversation: &Conversation,
            _options: &CompletionOptions,
        ) -> Result<String, GradeError> {
            self.seen.lock().unwrap().push(conversation.clone());
            match &self.reply {
                Ok(r) => Ok(r.clone()),
                Err((status, body)) => Err(GradeError::UpstreamError {
                    status: *status,
                    body: body.clone(),
                }),
            }
        }

        fn provider(&self) -> &'static str {
            "stub"
        }
    }

    const GOOD_REPLY: &str =
        r#"Sure! {"score": "15/20", "feedback": "Well argued.", "strengths": ["structure"], "weaknesses": ["citations"]}"#;

    fn docx(text: &str) -> Vec<u8> {
        let mut buf = Vec::new();
        Docx::new()
            .add_paragraph(Paragraph::new().add_run(Run::new().add_text(text)))
            .build()
            .pack(Cursor::new(&mut buf))
            .unwrap();
        buf
    }

    fn grader(dir: &TempDir, client: Arc<StubClient>, strict: bool) -> Grader {
        let config = GraderConfig::builder()
            .scratch_dir(dir.path().join("scratch"))
            .strict_field_validation(strict)
            .build()
            .unwrap();
        Grader::new(config, client)
    }

    fn request(filename: &str, bytes: Vec<u8>) -> GradingRequest {
        GradingRequest {
            assignment: Assignment {
                title: "Essay".into(),
                subject: "English".into(),
                instructions: "Write about spring".into(),
                criteria: "Clarity".into(),
            },
            file: Some(Upload {
                filename: filename.into(),
                bytes,
            }),
        }
    }

    fn scratch_entries(dir: &TempDir) -> usize {
        std::fs::read_dir(dir.path().join("scratch"))
            .map(|d| d.count())
            .unwrap_or(0)
    }

    #[tokio::test]
    async fn grades_docx_and_cleans_up() {
        let dir = TempDir::new().unwrap();
        let stub = StubClient::replying(GOOD_REPLY);
        let g = grader(&dir, stub.clone(), false);

        let eval = g
            .grade(request("essay.docx", docx("Spring is the season of renewal.")))
            .await
            .unwrap();
        assert_eq!(eval.score, Score::Text("15/20".into()));
        assert_eq!(eval.weaknesses, vec!["citations"]);
        assert_eq!(scratch_entries(&dir), 0);

        let seen = stub.seen.lock().unwrap();
        assert_eq!(seen.len(), 1);
        assert!(seen[0].messages[1]
            .content
            .contains("Spring is the season of renewal."));
    }

    #[tokio::test]
    async fn missing_file_creates_no_scratch_file() {
        let dir = TempDir::new().unwrap();
        let g = grader(&dir, StubClient::replying(GOOD_REPLY), false);
        let err = g.grade(GradingRequest::default()).await.unwrap_err();
        assert!(matches!(err, GradeError::MissingFile));
        assert_eq!(scratch_entries(&dir), 0);
    }

    #[tokio::test]
    async fn strict_mode_requires_instructions_and_criteria() {
        let dir = TempDir::new().unwrap();
        let g = grader(&dir, StubClient::replying(GOOD_REPLY), true);
        let mut req = request("essay.docx", docx("Some essay text here."));
        req.assignment.criteria = "  ".into();
        match g.grade(req).await.unwrap_err() {
            GradeError::MissingFields { fields } => assert_eq!(fields, vec!["criteria"]),
            other => panic!("unexpected: {other:?}"),
        }
        assert_eq!(scratch_entries(&dir), 0);
    }

    #[tokio::test]
    async fn lenient_mode_accepts_blank_fields() {
        let dir = TempDir::new().unwrap();
        let g = grader(&dir, StubClient::replying(GOOD_REPLY), false);
        let mut req = request("essay.docx", docx("Some essay text here."));
        req.assignment = Assignment::default();
        assert!(g.grade(req).await.is_ok());
    }

    #[tokio::test]
    async fn unsupported_type_still_cleans_up() {
        let dir = TempDir::new().unwrap();
        let stub = StubClient::replying(GOOD_REPLY);
        let g = grader(&dir, stub.clone(), false);
        let err = g
            .grade(request("notes.txt", b"plain text notes".to_vec()))
            .await
            .unwrap_err();
        assert!(matches!(err, GradeError::UnsupportedFileType { .. }));
        assert_eq!(scratch_entries(&dir), 0);
        assert!(stub.seen.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn short_text_is_rejected() {
        let dir = TempDir::new().unwrap();
        let g = grader(&dir, StubClient::replying(GOOD_REPLY), false);
        let err = g.grade(request("a.docx", docx("  tiny   "))).await.unwrap_err();
        assert!(matches!(
            err,
            GradeError::EmptyOrUnreadableDocument { chars: 4, min: 10 }
        ));
        assert_eq!(scratch_entries(&dir), 0);
    }

    #[tokio::test]
    async fn upstream_failure_propagates_and_cleans_up() {
        let dir = TempDir::new().unwrap();
        let g = grader(&dir, StubClient::failing(429, "quota exceeded"), false);
        let err = g
            .grade(request("essay.docx", docx("Spring is the season of renewal.")))
            .await
            .unwrap_err();
        assert!(err.to_string().contains("429"));
        assert!(err.to_string().contains("quota exceeded"));
        assert_eq!(scratch_entries(&dir), 0);
    }

    #[tokio::test]
    async fn unparseable_reply_is_invalid_model_response() {
        let dir = TempDir::new().unwrap();
        let g = grader(&dir, StubClient::replying("I refuse."), false);
        let err = g
            .grade(request("essay.docx", docx("Spring is the season of renewal.")))
            .await
            .unwrap_err();
        assert!(matches!(err, GradeError::InvalidModelResponse(_)));
        assert_eq!(scratch_entries(&dir), 0);
    }

    #[tokio::test]
    async fn identical_inputs_give_identical_prompts_and_results() {
        let dir = TempDir::new().unwrap();
        let stub = StubClient::replying(GOOD_REPLY);
        let g = grader(&dir, stub.clone(), false);
        let bytes = docx("Spring is the season of renewal.");

        let a = g.grade(request("e.docx", bytes.clone())).await.unwrap();
        let b = g.grade(request("e.docx", bytes)).await.unwrap();
        assert_eq!(a, b);

        let seen = stub.seen.lock().unwrap();
        assert_eq!(seen[0], seen[1]);
    }

    #[tokio::test]
    async fn grade_path_reads_local_file() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("local.docx");
        std::fs::write(&path, docx("A local essay about spring.")).unwrap();
        let g = grader(&dir, StubClient::replying(GOOD_REPLY), false);
        let eval = g.grade_path(&path, Assignment::default()).await.unwrap();
        assert_eq!(eval.feedback, "Well argued.");
        assert!(path.exists(), "source file must not be touched");
        assert_eq!(scratch_entries(&dir), 0);
    }
}
