use serde::Serialize;
use std::collections::BTreeMap;

/// Counts recorded at the end of one pipeline stage
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct StageTrace {
    pub stage: String,
    pub counts: BTreeMap<String, usize>,
}

impl StageTrace {
    pub fn new(stage: impl Into<String>) -> Self {
        Self {
            stage: stage.into(),
            counts: BTreeMap::new(),
        }
    }

    #[must_use]
    pub fn count(mut self, key: &str, value: usize) -> Self {
        self.counts.insert(key.to_string(), value);
        self
    }

    pub fn get(&self, key: &str) -> Option<usize> {
        self.counts.get(key).copied()
    }

    fn log(&self) {
        let counts: Vec<String> = self
            .counts
            .iter()
            .map(|(key, value)| format!("{key}={value}"))
            .collect();
        log::info!("[{}] {}", self.stage, counts.join(" "));
    }
}

/// An output that could not be produced
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FailedArtifact {
    pub path: String,
    pub error: String,
}

/// Outcome of one decomposition or recomposition run
#[derive(Debug, Clone, Default, Serialize)]
pub struct RunReport {
    pub operation: String,
    pub success: bool,
    pub stages: Vec<StageTrace>,
    pub written: Vec<String>,
    pub failed: Vec<FailedArtifact>,
    pub warnings: Vec<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl RunReport {
    pub fn new(operation: impl Into<String>) -> Self {
        Self {
            operation: operation.into(),
            ..Self::default()
        }
    }

    /// Record and log a finished stage
    pub fn record(&mut self, trace: StageTrace) {
        trace.log();
        self.stages.push(trace);
    }

    pub fn warn(&mut self, message: impl Into<String>) {
        let message = message.into();
        log::warn!("{message}");
        self.warnings.push(message);
    }

    pub fn stage(&self, name: &str) -> Option<&StageTrace> {
        self.stages.iter().find(|trace| trace.stage == name)
    }

    /// One-line human summary
    pub fn summary(&self) -> String {
        let status = if self.success { "succeeded" } else { "failed" };
        let mut summary = format!(
            "{} {status}: {} written, {} failed, {} warnings",
            self.operation,
            self.written.len(),
            self.failed.len(),
            self.warnings.len()
        );
        if let Some(error) = &self.error {
            summary.push_str(&format!(" ({error})"));
        }
        summary
    }
}
