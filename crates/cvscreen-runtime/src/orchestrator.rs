//! Screening run orchestration.
//!
//! A run takes one folder of CVs, derives the job role from the folder name
//! and produces one result row per document:
//! - Documents are processed one at a time, in file-name order
//! - A document that fails anywhere still gets a row
//! - The result table is written once, at the end

use futures::FutureExt;
use std::panic::AssertUnwindSafe;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use thiserror::Error;

use cvscreen_core::{
    build_evaluation_prompt, role_from_folder, EvaluationPrompt, ResultWriter, ScreeningRecord,
    WriterError,
};

use crate::config::RuntimeConfig;
use crate::evaluator::CvEvaluator;
use crate::extraction::{DocumentExtractor, ExtractedText, PdfExtractor};
use crate::panic_message;
use crate::providers::LlmProvider;

/// Errors that abort a run.
#[derive(Error, Debug)]
pub enum OrchestratorError {
    #[error("Failed to write results: {0}")]
    Write(#[from] WriterError),

    #[error("Failed to list documents in {}: {source}", path.display())]
    Discover {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("Orchestrator not configured: {0}")]
    NotConfigured(String),
}

/// What a finished run produced.
#[derive(Debug, Clone)]
pub struct RunSummary {
    /// Role derived from the folder name
    pub role: String,
    pub documents: usize,
    /// Rows that carry an error record
    pub failed: usize,
    pub output: PathBuf,
    pub records: Vec<ScreeningRecord>,
}

/// How a run ended. Only `Completed` writes a result table.
#[derive(Debug, Clone)]
pub enum RunOutcome {
    /// The folder does not exist or is not a directory
    FolderMissing,
    /// The folder holds no matching documents
    NoDocuments,
    Completed(RunSummary),
}

/// Drives extraction, evaluation and writing for one folder.
pub struct ScreeningOrchestrator {
    extractor: Arc<dyn DocumentExtractor>,
    evaluator: CvEvaluator,
    writer: ResultWriter,
    config: RuntimeConfig,
}

impl ScreeningOrchestrator {
    pub fn builder() -> ScreeningOrchestratorBuilder {
        ScreeningOrchestratorBuilder::new()
    }

    /// Screen every matching document in `folder` and write the table to `output`.
    pub async fn run(&self, folder: &Path, output: &Path) -> Result<RunOutcome, OrchestratorError> {
        if !folder.is_dir() {
            tracing::error!(folder = %folder.display(), "Folder does not exist");
            return Ok(RunOutcome::FolderMissing);
        }

        // Resolve `.` and friends so the role comes from the real folder name
        let resolved = folder.canonicalize().unwrap_or_else(|_| folder.to_path_buf());
        let role = role_from_folder(&resolved);
        let prompt = build_evaluation_prompt(&role);

        let documents = self.discover(folder)?;
        if documents.is_empty() {
            tracing::warn!(folder = %folder.display(), "No PDF files found");
            return Ok(RunOutcome::NoDocuments);
        }

        tracing::info!(
            role = %role,
            documents = documents.len(),
            provider = self.evaluator.provider_name(),
            "Processing CVs"
        );

        let total = documents.len();
        let mut records = Vec::with_capacity(total);
        for (index, path) in documents.iter().enumerate() {
            let name = file_name(path);
            tracing::info!(file = %name, index = index + 1, total, "Processing");

            let record = AssertUnwindSafe(self.process(path, &name, &prompt))
                .catch_unwind()
                .await
                .unwrap_or_else(|payload| {
                    let message = panic_message(&*payload);
                    tracing::error!(file = %name, error = %message, "Error processing file");
                    ScreeningRecord::error(name.clone(), &message)
                });
            records.push(record);
        }

        self.writer.write(&records, output)?;

        let failed = records.iter().filter(|r| r.result.is_sentinel()).count();
        tracing::info!(
            documents = records.len(),
            failed,
            output = %output.display(),
            "Processing complete"
        );

        Ok(RunOutcome::Completed(RunSummary {
            role,
            documents: records.len(),
            failed,
            output: output.to_path_buf(),
            records,
        }))
    }

    /// Matching regular files directly inside `folder`, sorted by name.
    fn discover(&self, folder: &Path) -> Result<Vec<PathBuf>, OrchestratorError> {
        let discover_error = |source| OrchestratorError::Discover {
            path: folder.to_path_buf(),
            source,
        };

        let mut documents = Vec::new();
        for entry in std::fs::read_dir(folder).map_err(discover_error)? {
            let path = entry.map_err(discover_error)?.path();
            if path.is_file() && self.config.accepts(&path) {
                documents.push(path);
            }
        }
        documents.sort_by(|a, b| a.file_name().cmp(&b.file_name()));
        Ok(documents)
    }

    async fn process(&self, path: &Path, name: &str, prompt: &EvaluationPrompt) -> ScreeningRecord {
        let extracted = self.extract(path).await;
        if let Some(reason) = extracted.failure() {
            tracing::warn!(file = %name, reason = %reason, "Extraction failed, evaluating empty text");
        }

        let evaluation = self.evaluator.evaluate(&extracted.text, prompt).await;
        let mut result = evaluation.result;

        if let Some(reason) = extracted.failure() {
            result.annotate(&format!("[extraction failed: {}] ", reason));
        }

        tracing::info!(
            file = %name,
            score = %result.score,
            attempts = evaluation.attempts,
            "Evaluated"
        );
        ScreeningRecord::new(name, result)
    }

    /// Run the extractor off the async workers. A panic inside it is
    /// re-raised here so the per-document handler sees it.
    async fn extract(&self, path: &Path) -> ExtractedText {
        let extractor = Arc::clone(&self.extractor);
        let path = path.to_path_buf();
        match tokio::task::spawn_blocking(move || extractor.extract(&path)).await {
            Ok(extracted) => extracted,
            Err(e) if e.is_panic() => std::panic::resume_unwind(e.into_panic()),
            Err(e) => ExtractedText::failed(e.to_string()),
        }
    }
}

fn file_name(path: &Path) -> String {
    path.file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| path.display().to_string())
}

/// Builder for [`ScreeningOrchestrator`].
pub struct ScreeningOrchestratorBuilder {
    provider: Option<Arc<dyn LlmProvider>>,
    extractor: Option<Arc<dyn DocumentExtractor>>,
    config: RuntimeConfig,
}

impl ScreeningOrchestratorBuilder {
    pub fn new() -> Self {
        Self {
            provider: None,
            extractor: None,
            config: RuntimeConfig::default(),
        }
    }

    /// Set the LLM provider.
    pub fn provider(mut self, provider: Arc<dyn LlmProvider>) -> Self {
        self.provider = Some(provider);
        self
    }

    /// Replace the default PDF extractor.
    pub fn extractor(mut self, extractor: Arc<dyn DocumentExtractor>) -> Self {
        self.extractor = Some(extractor);
        self
    }

    pub fn config(mut self, config: RuntimeConfig) -> Self {
        self.config = config;
        self
    }

    pub fn build(self) -> Result<ScreeningOrchestrator, OrchestratorError> {
        let provider = self
            .provider
            .ok_or_else(|| OrchestratorError::NotConfigured("LLM provider required".to_string()))?;

        let extractor = self
            .extractor
            .unwrap_or_else(|| Arc::new(PdfExtractor::new(self.config.header_font_size)));

        Ok(ScreeningOrchestrator {
            extractor,
            evaluator: CvEvaluator::new(provider, self.config.evaluator_settings()),
            writer: ResultWriter::new(),
            config: self.config,
        })
    }
}

impl Default for ScreeningOrchestratorBuilder {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::extraction::ExtractionStatus;
    use crate::providers::{ChatMessage, CompletionConfig, FragmentStream, ProviderError};
    use crate::test_support::cv_pdf;
    use async_trait::async_trait;
    use cvscreen_core::{SeniorityLevel, SummaryReport};
    use futures::StreamExt;
    use std::sync::Mutex;

    const HEADER: &str =
        "output,educationalQualification,jobHistory,skillSet,level,score,pass,justification";

    /// Answers deterministically from the CV text in the request.
    /// Requests whose CV contains `UNREACHABLE` fail at the transport level.
    struct ScriptedProvider {
        requests: Mutex<Vec<String>>,
    }

    impl ScriptedProvider {
        fn new() -> Arc<Self> {
            Arc::new(Self {
                requests: Mutex::new(Vec::new()),
            })
        }
    }

    #[async_trait]
    impl LlmProvider for ScriptedProvider {
        async fn stream_completion(
            &self,
            messages: Vec<ChatMessage>,
            _config: &CompletionConfig,
        ) -> Result<FragmentStream, ProviderError> {
            let request = messages
                .into_iter()
                .map(|m| m.content)
                .collect::<Vec<_>>()
                .join("\n");
            self.requests.lock().unwrap().push(request.clone());

            if request.contains("UNREACHABLE") {
                return Err(ProviderError::HttpError("connection refused".to_string()));
            }

            let strong = request.contains("Senior");
            let answer = serde_json::json!({
                "educationalQualification": "BSc Computer Science",
                "jobHistory": if strong { "6 years" } else { "1 year" },
                "skillSet": ["React", "Node.js"],
                "level": if strong { "senior" } else { "junior" },
                "score": if strong { 88 } else { 64 },
                "pass": strong,
                "justification": "Scripted"
            })
            .to_string();

            let (head, tail) = answer.split_at(answer.len() / 2);
            Ok(futures::stream::iter(vec![Ok(head.to_string()), Ok(tail.to_string())]).boxed())
        }

        async fn health_check(&self) -> bool {
            true
        }

        fn name(&self) -> &str {
            "scripted"
        }
    }

    /// Maps file names to canned text; `corrupt*` fails, `panic*` panics.
    struct StubExtractor;

    impl DocumentExtractor for StubExtractor {
        fn extract(&self, path: &Path) -> ExtractedText {
            let name = path.file_name().unwrap().to_string_lossy().to_string();
            if name.starts_with("corrupt") {
                return ExtractedText::failed("invalid PDF: xref not found");
            }
            if name.starts_with("panic") {
                panic!("parser exploded on {}", name);
            }
            ExtractedText {
                text: std::fs::read_to_string(path).unwrap(),
                pages: 1,
                status: ExtractionStatus::Structured,
            }
        }
    }

    fn orchestrator(provider: Arc<ScriptedProvider>) -> ScreeningOrchestrator {
        ScreeningOrchestrator::builder()
            .provider(provider)
            .extractor(Arc::new(StubExtractor))
            .build()
            .unwrap()
    }

    fn scenario_folder(root: &Path) -> PathBuf {
        let folder = root.join("junior_fullstack_developer");
        std::fs::create_dir(&folder).unwrap();
        std::fs::write(folder.join("bob.pdf"), "Bob\nSenior engineer, 6 years").unwrap();
        std::fs::write(folder.join("alice.pdf"), "Alice\nJunior developer").unwrap();
        std::fs::write(folder.join("corrupt.pdf"), "garbage").unwrap();
        std::fs::write(folder.join("notes.txt"), "not a CV").unwrap();
        folder
    }

    fn completed(outcome: RunOutcome) -> RunSummary {
        match outcome {
            RunOutcome::Completed(summary) => summary,
            other => panic!("expected a completed run, got {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_scenario_two_valid_one_corrupt() {
        let dir = tempfile::tempdir().unwrap();
        let folder = scenario_folder(dir.path());
        let output = dir.path().join("results.csv");
        let provider = ScriptedProvider::new();

        let summary = completed(orchestrator(provider.clone()).run(&folder, &output).await.unwrap());

        assert_eq!(summary.role, "junior fullstack developer");
        assert_eq!(summary.documents, 3);
        assert_eq!(summary.failed, 0);

        let written = std::fs::read_to_string(&output).unwrap();
        let lines: Vec<&str> = written.lines().map(|l| l.trim_end_matches('\r')).collect();
        assert_eq!(lines.len(), 4);
        assert_eq!(lines[0], HEADER);
        assert!(lines[1].starts_with("alice.pdf,"));
        assert!(lines[2].starts_with("bob.pdf,"));
        assert!(lines[3].starts_with("corrupt.pdf,"));

        let corrupt = &summary.records[2];
        assert_eq!(corrupt.output, "corrupt.pdf");
        assert!(corrupt
            .result
            .justification
            .as_deref()
            .unwrap()
            .starts_with("[extraction failed: invalid PDF: xref not found] "));

        let requests = provider.requests.lock().unwrap();
        assert_eq!(requests.len(), 3);
        assert!(requests
            .iter()
            .all(|r| r.contains("junior fullstack developer")));
        assert!(requests[0].contains("CV Content:\nAlice\nJunior developer"));
    }

    #[tokio::test]
    async fn test_runs_are_byte_identical() {
        let dir = tempfile::tempdir().unwrap();
        let folder = scenario_folder(dir.path());
        let first = dir.path().join("first.csv");
        let second = dir.path().join("second.csv");

        let orchestrator = orchestrator(ScriptedProvider::new());
        completed(orchestrator.run(&folder, &first).await.unwrap());
        completed(orchestrator.run(&folder, &second).await.unwrap());

        assert_eq!(std::fs::read(&first).unwrap(), std::fs::read(&second).unwrap());
    }

    #[tokio::test]
    async fn test_missing_folder_writes_nothing() {
        let dir = tempfile::tempdir().unwrap();
        let output = dir.path().join("results.csv");

        let outcome = orchestrator(ScriptedProvider::new())
            .run(&dir.path().join("no_such_role"), &output)
            .await
            .unwrap();

        assert!(matches!(outcome, RunOutcome::FolderMissing));
        assert!(!output.exists());
    }

    #[tokio::test]
    async fn test_file_instead_of_folder_is_missing() {
        let dir = tempfile::tempdir().unwrap();
        let file = dir.path().join("cv.pdf");
        std::fs::write(&file, "x").unwrap();

        let outcome = orchestrator(ScriptedProvider::new())
            .run(&file, &dir.path().join("results.csv"))
            .await
            .unwrap();
        assert!(matches!(outcome, RunOutcome::FolderMissing));
    }

    #[tokio::test]
    async fn test_folder_without_pdfs_writes_nothing() {
        let dir = tempfile::tempdir().unwrap();
        let folder = dir.path().join("data_analyst");
        std::fs::create_dir(&folder).unwrap();
        std::fs::write(folder.join("readme.txt"), "nothing here").unwrap();
        std::fs::create_dir(folder.join("nested.pdf")).unwrap();
        let output = dir.path().join("results.csv");

        let outcome = orchestrator(ScriptedProvider::new())
            .run(&folder, &output)
            .await
            .unwrap();

        assert!(matches!(outcome, RunOutcome::NoDocuments));
        assert!(!output.exists());
    }

    #[tokio::test]
    async fn test_uppercase_extension_is_picked_up() {
        let dir = tempfile::tempdir().unwrap();
        let folder = dir.path().join("qa-engineer");
        std::fs::create_dir(&folder).unwrap();
        std::fs::write(folder.join("CAROL.PDF"), "Carol").unwrap();

        let summary = completed(
            orchestrator(ScriptedProvider::new())
                .run(&folder, &dir.path().join("out.csv"))
                .await
                .unwrap(),
        );
        assert_eq!(summary.role, "qa engineer");
        assert_eq!(summary.records[0].output, "CAROL.PDF");
    }

    #[tokio::test]
    async fn test_panicking_document_still_gets_a_row() {
        let dir = tempfile::tempdir().unwrap();
        let folder = dir.path().join("backend_developer");
        std::fs::create_dir(&folder).unwrap();
        std::fs::write(folder.join("alice.pdf"), "Alice").unwrap();
        std::fs::write(folder.join("panic.pdf"), "boom").unwrap();
        std::fs::write(folder.join("zed.pdf"), "Zed, Senior").unwrap();
        let output = dir.path().join("results.csv");

        let summary = completed(
            orchestrator(ScriptedProvider::new())
                .run(&folder, &output)
                .await
                .unwrap(),
        );

        assert_eq!(summary.documents, 3);
        assert_eq!(summary.failed, 1);
        let broken = &summary.records[1];
        assert_eq!(broken.output, "panic.pdf");
        assert_eq!(broken.result.level, Some(SeniorityLevel::Error));
        assert_eq!(
            broken.result.justification.as_deref(),
            Some("Error: parser exploded on panic.pdf")
        );
        assert_eq!(summary.records[2].result.level, Some(SeniorityLevel::Senior));
    }

    #[tokio::test(start_paused = true)]
    async fn test_unreachable_backend_yields_sentinel_row() {
        let dir = tempfile::tempdir().unwrap();
        let folder = dir.path().join("devops");
        std::fs::create_dir(&folder).unwrap();
        std::fs::write(folder.join("a.pdf"), "UNREACHABLE").unwrap();
        std::fs::write(folder.join("b.pdf"), "Senior SRE").unwrap();
        let output = dir.path().join("results.csv");

        let summary = completed(
            orchestrator(ScriptedProvider::new())
                .run(&folder, &output)
                .await
                .unwrap(),
        );

        assert_eq!(summary.failed, 1);
        let written = std::fs::read_to_string(&output).unwrap();
        let row = written.lines().nth(1).unwrap().trim_end_matches('\r');
        assert_eq!(
            row,
            "a.pdf,Error processing,Error processing,Error processing,error,0,false,\
             API Error after 3 attempts: HTTP request failed: connection refused"
        );

        let report = SummaryReport::from_csv(&output).unwrap();
        assert_eq!(report.total, 2);
        assert_eq!(report.passed, 1);
    }

    #[tokio::test]
    async fn test_write_failure_propagates() {
        let dir = tempfile::tempdir().unwrap();
        let folder = scenario_folder(dir.path());
        let output = dir.path().join("missing_dir").join("results.csv");

        let result = orchestrator(ScriptedProvider::new()).run(&folder, &output).await;
        assert!(matches!(result, Err(OrchestratorError::Write(_))));
    }

    #[test]
    fn test_builder_requires_provider() {
        let result = ScreeningOrchestrator::builder().build();
        assert!(matches!(result, Err(OrchestratorError::NotConfigured(_))));
    }

    #[tokio::test]
    async fn test_end_to_end_with_real_pdfs() {
        let dir = tempfile::tempdir().unwrap();
        let folder = dir.path().join("junior_fullstack_developer");
        std::fs::create_dir(&folder).unwrap();
        std::fs::write(
            folder.join("alice.pdf"),
            cv_pdf("Alice Smith", &["Junior developer", "React, Node.js"]),
        )
        .unwrap();
        std::fs::write(
            folder.join("bob.pdf"),
            cv_pdf("Bob Jones", &["Senior engineer", "Go, Kubernetes"]),
        )
        .unwrap();
        std::fs::write(folder.join("broken.pdf"), b"%PDF-1.4\nnot a real document").unwrap();
        let output = dir.path().join("results.csv");
        let provider = ScriptedProvider::new();

        let orchestrator = ScreeningOrchestrator::builder()
            .provider(provider.clone())
            .build()
            .unwrap();
        let summary = completed(orchestrator.run(&folder, &output).await.unwrap());

        assert_eq!(summary.documents, 3);
        let requests = provider.requests.lock().unwrap();
        assert!(requests[0].contains("CV Content:\n# Alice Smith\nJunior developer\nReact, Node.js"));
        assert!(requests[1].contains("# Bob Jones"));

        let broken = summary
            .records
            .iter()
            .find(|r| r.output == "broken.pdf")
            .unwrap();
        assert!(broken
            .result
            .justification
            .as_deref()
            .unwrap()
            .starts_with("[extraction failed: "));

        let report = SummaryReport::from_records(&summary.records);
        assert_eq!(report.total, 3);
        assert_eq!(report.passed, 1);
    }
}
