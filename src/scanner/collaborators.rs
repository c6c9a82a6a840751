//! Boundaries of the scan loop: the XSLT processor and the report sink

use parking_lot::Mutex;

use crate::analyzer::VulnerabilityCandidate;
use crate::documents::RenderedDocument;
use crate::error::TransformError;

/// Black-box XSLT processor.
///
/// Calls block; the scanner runs them on the blocking thread pool under a
/// timeout. Any closure `Fn(&str, &str) -> Result<String, TransformError>`
/// taking the input document and the stylesheet URI is a transformer.
pub trait Transformer: Send + Sync {
    /// Apply the stylesheet to an input document
    fn transform(&self, xml: &str, stylesheet_uri: &str) -> Result<String, TransformError>;

    /// Apply the stylesheet to a rendered test case. Processors that bind
    /// stylesheet parameters or extension functions override this.
    fn transform_document(
        &self,
        document: &RenderedDocument,
        stylesheet_uri: &str,
    ) -> Result<String, TransformError> {
        self.transform(&document.xml, stylesheet_uri)
    }
}

impl<F> Transformer for F
where
    F: Fn(&str, &str) -> Result<String, TransformError> + Send + Sync,
{
    fn transform(&self, xml: &str, stylesheet_uri: &str) -> Result<String, TransformError> {
        self(xml, stylesheet_uri)
    }
}

/// Receives confirmed findings
pub trait ReportSink: Send + Sync {
    /// Handle one finding
    fn report(&self, finding: &VulnerabilityCandidate);
}

/// Keeps findings in memory
#[derive(Debug, Default)]
pub struct CollectingSink {
    findings: Mutex<Vec<VulnerabilityCandidate>>,
}

impl CollectingSink {
    /// Create an empty sink
    pub fn new() -> Self {
        Self::default()
    }

    /// Findings reported so far
    pub fn findings(&self) -> Vec<VulnerabilityCandidate> {
        self.findings.lock().clone()
    }

    /// Number of findings
    pub fn len(&self) -> usize {
        self.findings.lock().len()
    }

    /// Whether nothing was reported
    pub fn is_empty(&self) -> bool {
        self.findings.lock().is_empty()
    }
}

impl ReportSink for CollectingSink {
    fn report(&self, finding: &VulnerabilityCandidate) {
        self.findings.lock().push(finding.clone());
    }
}

/// Writes findings to the log
#[derive(Debug, Clone, Copy, Default)]
pub struct LogSink;

impl ReportSink for LogSink {
    fn report(&self, finding: &VulnerabilityCandidate) {
        log::info!(
            "[{}] schema object {} at {}: injected {:?}, output {:?}",
            finding.rule_id,
            finding.schema_object,
            finding.path,
            finding.input_sample,
            finding.output_sample
        );
    }
}
