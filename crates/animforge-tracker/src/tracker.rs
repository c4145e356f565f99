//! Single-writer status event emitter.

use crate::capture::LogSinkRegistry;
use crate::event::{Metrics, StatusEvent, number as json_number};
use std::io::{self, Write};
use std::sync::{Arc, Mutex, PoisonError};
use tracing::Level;

/// Emits structured status events for one training run.
///
/// The primary channel (stdout by default) carries exactly one JSON object per
/// line; the secondary channel (stderr by default) carries human-readable
/// diagnostics. Emission never panics the caller: serialization and write
/// failures are downgraded to secondary-channel diagnostics.
pub struct Tracker {
    primary: Mutex<Box<dyn Write + Send>>,
    secondary: Mutex<Box<dyn Write + Send>>,
    min_level: Level,
    emit_percent_progress: bool,
}

impl std::fmt::Debug for Tracker {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Tracker")
            .field("min_level", &self.min_level)
            .field("emit_percent_progress", &self.emit_percent_progress)
            .finish_non_exhaustive()
    }
}

impl Tracker {
    #[must_use]
    pub fn builder() -> TrackerBuilder {
        TrackerBuilder::default()
    }

    /// Emit one status event immediately, unconditionally.
    pub fn log_ui_status(&self, status: &str, text: &str) {
        self.emit(&StatusEvent::new(status, text));
    }

    /// Emit an epoch-completion event.
    ///
    /// `metrics` must contain an `epoch` key; without one the record is only a
    /// debug diagnostic, never a wire event.
    pub fn log_epoch(&self, status: &str, metrics: Metrics, text: Option<&str>) {
        let Some(epoch) = metrics.get("epoch") else {
            self.diag(&format!(
                "epoch record '{status}' without epoch field, metrics: {}",
                serde_json::Value::Object(metrics.clone())
            ));
            return;
        };
        let text = text.map_or_else(
            || format!("Epoch {} completed", render_value(epoch)),
            ToOwned::to_owned,
        );
        self.emit(&StatusEvent::with_metrics(status, text, metrics));
    }

    /// Emit a percentage progress event, if percentage reporting is enabled.
    ///
    /// Disabled by default: high-frequency progress lines would flood the wire
    /// and overwrite meaningful state in the consuming UI.
    pub fn log_percentage_progress(&self, status: &str, percentage: f64, text: Option<&str>) {
        if !self.emit_percent_progress {
            return;
        }
        let text =
            text.map_or_else(|| format!("Progress: {percentage}%"), ToOwned::to_owned);
        let mut metrics = Metrics::new();
        metrics.insert("progress_percent".to_string(), json_number(percentage));
        self.emit(&StatusEvent::with_metrics(status, text, metrics));
    }

    /// Emit a captured log record, respecting the configured minimum severity.
    ///
    /// The severity name becomes the status label verbatim.
    pub fn log_std_record(&self, level: Level, message: &str) {
        if level > self.min_level {
            return;
        }
        self.log_ui_status(&level.to_string(), message);
    }

    /// Report a failure on both channels: one `Error` status event carrying the
    /// error type and full cause chain as metrics, plus a human-readable block
    /// on the secondary channel. Always both, never only one.
    pub fn log_exception<E>(&self, context: &str, error: &E)
    where
        E: std::error::Error + ?Sized,
    {
        let type_name = short_type_name(std::any::type_name_of_val(error));
        let trace = error_chain(error);

        let mut metrics = Metrics::new();
        metrics.insert("exception_type".to_string(), type_name.clone().into());
        metrics.insert("traceback".to_string(), trace.clone().into());
        self.emit(&StatusEvent::with_metrics("Error", format!("{context}: {error}"), metrics));

        let mut out = lock(&self.secondary);
        let _ = writeln!(out, "\n=== EXCEPTION ===");
        let _ = writeln!(out, "Context: {context}");
        let _ = writeln!(out, "Exception: {type_name}: {error}");
        let _ = writeln!(out, "{trace}");
        let _ = writeln!(out, "=================");
        let _ = out.flush();
    }

    fn emit(&self, event: &StatusEvent) {
        match serde_json::to_string(event) {
            Ok(line) => {
                let mut out = lock(&self.primary);
                if writeln!(out, "{line}").and_then(|()| out.flush()).is_err() {
                    drop(out);
                    self.diag("status event write failed, primary channel unavailable");
                }
            }
            Err(e) => self.diag(&format!("status event serialization failed: {e}")),
        }
    }

    fn diag(&self, message: &str) {
        let mut out = lock(&self.secondary);
        let _ = writeln!(out, "{message}");
        let _ = out.flush();
    }
}

/// Builder for [`Tracker`].
pub struct TrackerBuilder {
    primary: Box<dyn Write + Send>,
    secondary: Box<dyn Write + Send>,
    min_level: Level,
    emit_percent_progress: bool,
}

impl Default for TrackerBuilder {
    fn default() -> Self {
        Self {
            primary: Box::new(io::stdout()),
            secondary: Box::new(io::stderr()),
            min_level: Level::ERROR,
            emit_percent_progress: false,
        }
    }
}

impl TrackerBuilder {
    #[must_use]
    pub fn primary(mut self, writer: impl Write + Send + 'static) -> Self {
        self.primary = Box::new(writer);
        self
    }

    #[must_use]
    pub fn secondary(mut self, writer: impl Write + Send + 'static) -> Self {
        self.secondary = Box::new(writer);
        self
    }

    /// Minimum severity of captured log records emitted as status events.
    #[must_use]
    pub fn min_level(mut self, level: Level) -> Self {
        self.min_level = level;
        self
    }

    #[must_use]
    pub fn emit_percent_progress(mut self, enabled: bool) -> Self {
        self.emit_percent_progress = enabled;
        self
    }

    #[must_use]
    pub fn build(self) -> Arc<Tracker> {
        Arc::new(Tracker {
            primary: Mutex::new(self.primary),
            secondary: Mutex::new(self.secondary),
            min_level: self.min_level,
            emit_percent_progress: self.emit_percent_progress,
        })
    }

    /// Build the tracker and install it as the process log sink, replacing any
    /// previously installed sink.
    #[must_use]
    pub fn install(self, registry: &LogSinkRegistry) -> Arc<Tracker> {
        let tracker = self.build();
        registry.install(Arc::clone(&tracker));
        tracker
    }
}

fn lock<'a>(
    mutex: &'a Mutex<Box<dyn Write + Send>>,
) -> std::sync::MutexGuard<'a, Box<dyn Write + Send>> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

fn render_value(value: &serde_json::Value) -> String {
    match value {
        serde_json::Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}

fn short_type_name(full: &str) -> String {
    full.rsplit("::").next().unwrap_or(full).to_string()
}

fn error_chain<E>(error: &E) -> String
where
    E: std::error::Error + ?Sized,
{
    let mut chain = vec![error.to_string()];
    let mut source = error.source();
    while let Some(cause) = source {
        chain.push(cause.to_string());
        source = cause.source();
    }
    chain.join("\ncaused by: ")
}
