use serde::{Deserialize, Serialize};

/// Open metric mapping attached to a status event (epoch index, losses,
/// progress percent, ...).
pub type Metrics = serde_json::Map<String, serde_json::Value>;

/// One record on the status-event wire.
///
/// Serialized as a single JSON object per line on the primary output channel.
/// Field names and nesting are a stable contract with the consuming host
/// process; `metrics` is present only when supplied.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StatusEvent {
    pub status: String,
    pub text: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub metrics: Option<Metrics>,
}

/// JSON number from an `f64`, `null` when the value is not representable.
#[must_use]
pub fn number(value: f64) -> serde_json::Value {
    serde_json::Number::from_f64(value).map_or(serde_json::Value::Null, serde_json::Value::Number)
}

impl StatusEvent {
    pub fn new(status: impl Into<String>, text: impl Into<String>) -> Self {
        Self { status: status.into(), text: text.into(), metrics: None }
    }

    pub fn with_metrics(
        status: impl Into<String>,
        text: impl Into<String>,
        metrics: Metrics,
    ) -> Self {
        Self { status: status.into(), text: text.into(), metrics: Some(metrics) }
    }
}
