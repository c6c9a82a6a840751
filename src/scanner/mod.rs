//! Scan orchestration
//!
//! One scan runs a number of iterations against one stylesheet. Each
//! iteration generates a plan, renders it, runs the transform, parses the
//! output and lets the analyzer propose injections. Every proposal then goes
//! through its own confirmation cycle: derive the modified plan, render,
//! transform, parse and verify. Confirmation cycles of one iteration are
//! polled together on the scan task; only their blocking transform step runs
//! in parallel, on the blocking pool, bounded by `max_concurrent_confirmations`.
//!
//! Collaborator failures (transform errors, timeouts, unparseable or
//! oversized output) never abort a scan. In a first run they fail the
//! iteration; in a confirmation run they refute the candidate. Wiring errors
//! such as a plan that does not match the schema abort the scan.

mod collaborators;

pub use collaborators::{CollectingSink, LogSink, ReportSink, Transformer};

use std::collections::HashSet;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use futures::future::join_all;
use parking_lot::Mutex;
use tokio::sync::Semaphore;

use crate::analyzer::{
    AnalyzerEngine, Candidate, ModificationRequest, Verification, VulnerabilityCandidate,
};
use crate::config::ScanConfig;
use crate::documents::{DocumentRenderer, RenderedDocument};
use crate::dom::{OutputDocument, OutputParser, XhtmlOutputParser};
use crate::error::{Error, Result, TransformError};
use crate::request::{Request, RequestGenerator};
use crate::schema::{SchemaObjectId, XsltSchema};
use crate::values::{PrefixSelector, TaintMarker};

/// Counters of a finished scan
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ScanSummary {
    /// Iterations started
    pub iterations: usize,
    /// Iterations whose first run failed in a collaborator
    pub failed_iterations: usize,
    /// Modification requests proposed by the analyzer
    pub detections: usize,
    /// Candidates skipped because the same rule already confirmed a finding
    /// on the same schema object
    pub duplicates: usize,
    /// Confirmed candidates
    pub confirmed: usize,
    /// Refuted candidates
    pub refuted: usize,
    /// Whether the scan stopped early
    pub cancelled: bool,
}

/// Stops a running scan from submitting new work
#[derive(Debug, Clone, Default)]
pub struct CancellationHandle {
    flag: Arc<AtomicBool>,
}

impl CancellationHandle {
    /// Request cancellation
    pub fn cancel(&self) {
        self.flag.store(true, Ordering::SeqCst);
    }

    /// Whether cancellation was requested
    pub fn is_cancelled(&self) -> bool {
        self.flag.load(Ordering::SeqCst)
    }
}

enum Outcome {
    Duplicate,
    Confirmed,
    Refuted,
    Cancelled,
}

/// Runs the generate, detect and confirm loop for one stylesheet
pub struct Scanner {
    config: ScanConfig,
    schema: Arc<XsltSchema>,
    transformer: Arc<dyn Transformer>,
    parser: Arc<dyn OutputParser>,
    engine: Arc<AnalyzerEngine>,
    sink: Arc<dyn ReportSink>,
    cancellation: CancellationHandle,
}

impl std::fmt::Debug for Scanner {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Scanner")
            .field("config", &self.config)
            .field("stylesheet", &self.schema.stylesheet_uri())
            .field("engine", &self.engine)
            .finish()
    }
}

impl Scanner {
    /// Create a scanner with the default output parser, the built-in
    /// analyzer rules and a logging report sink
    pub fn new(config: ScanConfig, schema: Arc<XsltSchema>, transformer: Arc<dyn Transformer>) -> Self {
        let engine = AnalyzerEngine::with_default_rules(config.analyzer.clone());
        Self {
            config,
            schema,
            transformer,
            parser: Arc::new(XhtmlOutputParser::new()),
            engine: Arc::new(engine),
            sink: Arc::new(LogSink),
            cancellation: CancellationHandle::default(),
        }
    }

    /// Use another output parser
    pub fn with_parser(mut self, parser: Arc<dyn OutputParser>) -> Self {
        self.parser = parser;
        self
    }

    /// Use another analyzer engine
    pub fn with_engine(mut self, engine: Arc<AnalyzerEngine>) -> Self {
        self.engine = engine;
        self
    }

    /// Use another report sink
    pub fn with_sink(mut self, sink: Arc<dyn ReportSink>) -> Self {
        self.sink = sink;
        self
    }

    /// Handle for cancelling scans of this scanner
    pub fn cancellation_handle(&self) -> CancellationHandle {
        self.cancellation.clone()
    }

    /// The configuration
    pub fn config(&self) -> &ScanConfig {
        &self.config
    }

    /// Select the taint marker for the stylesheet, then scan
    pub async fn scan_with_selector(&self, selector: &dyn PrefixSelector) -> Result<ScanSummary> {
        let marker = selector.select_prefix(self.schema.stylesheet_uri())?;
        self.scan(&marker).await
    }

    /// Run all iterations
    pub async fn scan(&self, marker: &TaintMarker) -> Result<ScanSummary> {
        log::info!(
            "Scanning {} v{}: {} iterations, seed {}, marker prefix '{}'",
            self.schema.stylesheet_uri(),
            self.schema.version(),
            self.config.iterations,
            self.config.seed,
            marker.prefix()
        );

        let mut summary = ScanSummary::default();
        let reported: Mutex<HashSet<(String, SchemaObjectId)>> = Mutex::new(HashSet::new());
        let permits = Semaphore::new(self.config.max_concurrent_confirmations.max(1));

        for iteration in 0..self.config.iterations {
            if self.cancellation.is_cancelled() {
                summary.cancelled = true;
                break;
            }
            summary.iterations += 1;
            let seed = self.config.seed.wrapping_add(iteration as u64);

            let mut generator = RequestGenerator::seeded(self.config.generator.clone(), seed);
            let request = generator.generate_new_request(&self.schema, self.config.content_mode)?;
            let (rendered, output) = match self.execute(&request, marker).await {
                Ok(result) => result,
                Err(e) if e.is_collaborator_failure() => {
                    log::warn!("Iteration {} (seed {}) failed: {}", iteration, seed, e);
                    summary.failed_iterations += 1;
                    continue;
                }
                Err(e) => return Err(e),
            };

            let detections = self
                .engine
                .analyze(&output, &self.schema, &rendered.ledger, marker);
            summary.detections += detections.len();

            let cycles = detections
                .into_iter()
                .map(|detection| self.confirm(detection, &request, marker, &permits, &reported));
            for outcome in join_all(cycles).await {
                match outcome? {
                    Outcome::Duplicate => summary.duplicates += 1,
                    Outcome::Confirmed => summary.confirmed += 1,
                    Outcome::Refuted => summary.refuted += 1,
                    Outcome::Cancelled => summary.cancelled = true,
                }
            }
        }

        log::info!(
            "Scan of {} finished: {} iterations ({} failed), {} detections, {} confirmed, {} refuted{}",
            self.schema.stylesheet_uri(),
            summary.iterations,
            summary.failed_iterations,
            summary.detections,
            summary.confirmed,
            summary.refuted,
            if summary.cancelled { ", cancelled" } else { "" }
        );
        Ok(summary)
    }

    /// Render, transform and parse one plan
    async fn execute(
        &self,
        request: &Request,
        marker: &TaintMarker,
    ) -> Result<(Arc<RenderedDocument>, OutputDocument)> {
        let rendered = DocumentRenderer::new(&self.schema, marker.clone())
            .with_value_config(self.config.values.clone())
            .with_limits(self.config.limits().clone())
            .render(request)?;
        let rendered = Arc::new(rendered);
        let output = self.transform(Arc::clone(&rendered)).await?;
        let document = self.parser.parse(&output)?;
        Ok((rendered, document))
    }

    async fn transform(&self, document: Arc<RenderedDocument>) -> Result<String> {
        let transformer = Arc::clone(&self.transformer);
        let stylesheet = self.schema.stylesheet_uri().to_string();
        let uri = stylesheet.clone();
        let task = tokio::task::spawn_blocking(move || transformer.transform_document(&document, &uri));

        let timeout = self.config.transform_timeout();
        let output = match tokio::time::timeout(timeout, task).await {
            // The blocking call keeps running, its result is dropped
            Err(_) => return Err(Error::Timeout(timeout)),
            Ok(Err(join_error)) => {
                return Err(TransformError::new(format!("Transform task failed: {}", join_error))
                    .with_stylesheet(stylesheet)
                    .into())
            }
            Ok(Ok(result)) => result?,
        };
        self.config.limits().check_output_size(output.len())?;
        Ok(output)
    }

    /// One candidate's confirmation cycle
    async fn confirm(
        &self,
        detection: ModificationRequest,
        original: &Request,
        marker: &TaintMarker,
        permits: &Semaphore,
        reported: &Mutex<HashSet<(String, SchemaObjectId)>>,
    ) -> Result<Outcome> {
        let key = (detection.analyzer_rule.clone(), detection.payload.schema_object);
        if reported.lock().contains(&key) {
            return Ok(Outcome::Duplicate);
        }

        let _permit = permits
            .acquire()
            .await
            .map_err(|e| Error::Other(format!("Confirmation permits closed: {}", e)))?;
        if self.cancellation.is_cancelled() {
            return Ok(Outcome::Cancelled);
        }

        let mut candidate = Candidate::new(detection);
        let confirmation = candidate.begin_confirmation(original)?;
        let verification = match self.execute(&confirmation, marker).await {
            Ok((_, output)) => self.engine.verify(candidate.request(), &output)?,
            Err(e) if e.is_collaborator_failure() => {
                let request = candidate.request();
                log::warn!(
                    "Confirmation of {} refuted by collaborator failure (schema object {}, input {:?}): {}",
                    request.analyzer_rule,
                    request.payload.schema_object,
                    request.payload.replacement,
                    e
                );
                Verification::refuted(e.to_string())
            }
            Err(e) => return Err(e),
        };

        match candidate.resolve(verification)? {
            Some(finding) => Ok(self.report(key, finding, reported)),
            None => Ok(Outcome::Refuted),
        }
    }

    fn report(
        &self,
        key: (String, SchemaObjectId),
        finding: VulnerabilityCandidate,
        reported: &Mutex<HashSet<(String, SchemaObjectId)>>,
    ) -> Outcome {
        if !reported.lock().insert(key) {
            return Outcome::Duplicate;
        }
        log::info!(
            "Confirmed {} on schema object {} at {}",
            finding.rule_id,
            finding.schema_object,
            finding.path
        );
        self.sink.report(&finding);
        Outcome::Confirmed
    }
}
