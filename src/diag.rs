use serde::Serialize;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Severity {
    Warning,
    Error,
}

#[derive(Debug, Clone, Serialize)]
pub struct Diagnostic {
    pub severity: Severity,
    pub message: String,
    pub context: Option<String>,
}

/// Ordered sink for non-fatal parse/reconcile findings. Records accumulate
/// per call so callers (and tests) can inspect them; each record is also
/// mirrored to the tracing subscriber as it is pushed.
#[derive(Debug, Default)]
pub struct Diagnostics {
    records: Vec<Diagnostic>,
}

impl Diagnostics {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn warn(&mut self, context: impl Into<String>, message: impl Into<String>) {
        let context = context.into();
        let message = message.into();
        tracing::warn!("{context}: {message}");
        self.records.push(Diagnostic {
            severity: Severity::Warning,
            message,
            context: Some(context),
        });
    }

    pub fn error(&mut self, context: impl Into<String>, message: impl Into<String>) {
        let context = context.into();
        let message = message.into();
        tracing::error!("{context}: {message}");
        self.records.push(Diagnostic {
            severity: Severity::Error,
            message,
            context: Some(context),
        });
    }

    pub fn records(&self) -> &[Diagnostic] {
        &self.records
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    pub fn error_count(&self) -> usize {
        self.records
            .iter()
            .filter(|record| record.severity == Severity::Error)
            .count()
    }
}
