//! # Telemetry Settings Form
//!
//! The smaller sibling of the connection form: three sections (event log,
//! metrics, traces) edited through reducer-style actions and saved as one
//! JSON document. The save endpoint answers with the same inline-XML error
//! convention as the connection save, keyed by the dotted setting names.

use std::collections::BTreeMap;
use std::fmt;
use std::sync::Arc;

use roxmltree::Document;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{info, warn};

use crate::host::{Transport, TransportError};

#[derive(Debug, Error)]
pub enum TelemetryError {
    #[error(transparent)]
    Transport(#[from] TransportError),

    #[error("malformed server response: {0}")]
    Xml(#[from] roxmltree::Error),

    #[error("could not encode settings: {0}")]
    Json(#[from] serde_json::Error),
}

/// Event-log capture settings.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize, Serialize)]
pub struct EventLogSettings {
    #[serde(rename = "telemetry.events.enabled")]
    pub enabled: bool,
    #[serde(rename = "telemetry.events.artifacts.storage.days")]
    pub artifacts_storage_days: u32,
}

/// Metrics export settings.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize, Serialize)]
pub struct MetricsSettings {
    #[serde(rename = "telemetry.metrics.enabled")]
    pub enabled: bool,
}

/// Trace export settings.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize, Serialize)]
pub struct TracesSettings {
    #[serde(rename = "telemetry.traces.enabled")]
    pub enabled: bool,
    #[serde(rename = "telemetry.traces.endpoint.url")]
    pub endpoint_url: String,
    #[serde(rename = "telemetry.traces.endpoint.ssl")]
    pub endpoint_ssl: String,
    #[serde(rename = "telemetry.traces.endpoint.gzip")]
    pub endpoint_gzip: bool,
    #[serde(rename = "telemetry.traces.endpoint.headers")]
    pub endpoint_headers: String,
}

/// The whole telemetry model as the save endpoint consumes it.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TelemetryData {
    pub event_log_model: EventLogSettings,
    pub metrics_model: MetricsSettings,
    pub traces_model: TracesSettings,
    pub project_id: String,
}

/// Server-routed URLs for the telemetry page.
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
#[serde(rename_all = "camelCase", default)]
pub struct TelemetryUrls {
    pub test_traces_url: String,
    pub agent_event_logs_url: String,
    pub build_events_logs_url: String,
    pub metrics_endpoint_url: String,
    pub form_endpoint_url: String,
}

/// Reducer actions. The closed set replaces the original's stringly
/// section/key dispatch so an unknown setting cannot be written silently.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TelemetryAction {
    SetEventLogEnabled(bool),
    SetArtifactsStorageDays(u32),
    SetMetricsEnabled(bool),
    SetTracesEnabled(bool),
    SetTracesEndpointUrl(String),
    SetTracesEndpointSsl(String),
    SetTracesEndpointGzip(bool),
    SetTracesEndpointHeaders(String),
    /// Outcome of a save attempt; replaces the whole error map.
    SaveResult { errors: BTreeMap<String, String> },
}

/// Result of a save attempt.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TelemetrySaveOutcome {
    Saved,
    /// Setting name → message, as reported by the inline XML errors.
    Invalid(BTreeMap<String, String>),
}

/// Result of a traces test connection.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TelemetryTestOutcome {
    pub success: bool,
    pub message: String,
}

/// One rendered telemetry form.
pub struct TelemetryForm {
    data: TelemetryData,
    urls: TelemetryUrls,
    errors: BTreeMap<String, String>,
    transport: Arc<dyn Transport>,
}

impl fmt::Debug for TelemetryForm {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TelemetryForm")
            .field("project_id", &self.data.project_id)
            .field("errors", &self.errors)
            .finish_non_exhaustive()
    }
}

impl TelemetryForm {
    pub fn new(data: TelemetryData, urls: TelemetryUrls, transport: Arc<dyn Transport>) -> Self {
        Self {
            data,
            urls,
            errors: BTreeMap::new(),
            transport,
        }
    }

    pub fn data(&self) -> &TelemetryData {
        &self.data
    }

    pub fn errors(&self) -> &BTreeMap<String, String> {
        &self.errors
    }

    /// Apply one reducer action.
    pub fn apply(&mut self, action: TelemetryAction) {
        match action {
            TelemetryAction::SetEventLogEnabled(value) => {
                self.data.event_log_model.enabled = value;
            }
            TelemetryAction::SetArtifactsStorageDays(value) => {
                self.data.event_log_model.artifacts_storage_days = value;
            }
            TelemetryAction::SetMetricsEnabled(value) => {
                self.data.metrics_model.enabled = value;
            }
            TelemetryAction::SetTracesEnabled(value) => {
                self.data.traces_model.enabled = value;
            }
            TelemetryAction::SetTracesEndpointUrl(value) => {
                self.data.traces_model.endpoint_url = value;
            }
            TelemetryAction::SetTracesEndpointSsl(value) => {
                self.data.traces_model.endpoint_ssl = value;
            }
            TelemetryAction::SetTracesEndpointGzip(value) => {
                self.data.traces_model.endpoint_gzip = value;
            }
            TelemetryAction::SetTracesEndpointHeaders(value) => {
                self.data.traces_model.endpoint_headers = value;
            }
            TelemetryAction::SaveResult { errors } => self.errors = errors,
        }
    }

    /// Save the whole model. Inline errors are recorded on the form and
    /// returned; transport failures are generic.
    pub async fn save(&mut self) -> Result<TelemetrySaveOutcome, TelemetryError> {
        let body = serde_json::to_value(&self.data)?;
        let response = self
            .transport
            .post_json(&self.urls.form_endpoint_url, &body)
            .await?;

        let errors = all_inline_errors(&response)?;
        if errors.is_empty() {
            info!(project_id = %self.data.project_id, "telemetry settings saved");
            self.apply(TelemetryAction::SaveResult {
                errors: BTreeMap::new(),
            });
            Ok(TelemetrySaveOutcome::Saved)
        } else {
            warn!(count = errors.len(), "telemetry save rejected");
            self.apply(TelemetryAction::SaveResult {
                errors: errors.clone(),
            });
            Ok(TelemetrySaveOutcome::Invalid(errors))
        }
    }

    /// Probe the traces endpoint with the current (unsaved) settings.
    pub async fn test_traces_connection(
        &self,
    ) -> Result<TelemetryTestOutcome, TelemetryError> {
        let url = format!(
            "{}?projectId={}",
            self.urls.test_traces_url, self.data.project_id
        );
        let body = serde_json::to_value(&self.data.traces_model)?;
        let response = self.transport.post_json(&url, &body).await?;

        let doc = Document::parse(&response)?;
        let error = doc
            .descendants()
            .find(|node| node.has_tag_name("error"))
            .map(|node| node.text().unwrap_or_default().to_string());

        Ok(match error {
            Some(message) => TelemetryTestOutcome {
                success: false,
                message,
            },
            None => TelemetryTestOutcome {
                success: true,
                message: "Successfully tested the connection!".to_string(),
            },
        })
    }
}

/// Every `<error id>` element in the document, regardless of nesting. The
/// telemetry endpoint does not wrap them in an `<errors>` root.
fn all_inline_errors(xml: &str) -> Result<BTreeMap<String, String>, TelemetryError> {
    let doc = Document::parse(xml)?;
    Ok(doc
        .descendants()
        .filter(|node| node.has_tag_name("error"))
        .map(|node| {
            (
                node.attribute("id").unwrap_or_default().to_string(),
                node.text().unwrap_or_default().to_string(),
            )
        })
        .collect())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_actions_update_their_section() {
        let mut form = TelemetryForm::new(
            TelemetryData::default(),
            TelemetryUrls::default(),
            Arc::new(support::NullTransport),
        );

        form.apply(TelemetryAction::SetEventLogEnabled(true));
        form.apply(TelemetryAction::SetArtifactsStorageDays(14));
        form.apply(TelemetryAction::SetTracesEndpointUrl(
            "https://otel.example.com:4318".to_string(),
        ));
        form.apply(TelemetryAction::SetTracesEndpointGzip(true));

        assert!(form.data().event_log_model.enabled);
        assert_eq!(form.data().event_log_model.artifacts_storage_days, 14);
        assert_eq!(
            form.data().traces_model.endpoint_url,
            "https://otel.example.com:4318"
        );
        assert!(form.data().traces_model.endpoint_gzip);
        assert!(!form.data().metrics_model.enabled);
    }

    #[test]
    fn test_save_result_replaces_error_map() {
        let mut form = TelemetryForm::new(
            TelemetryData::default(),
            TelemetryUrls::default(),
            Arc::new(support::NullTransport),
        );

        let mut errors = BTreeMap::new();
        errors.insert(
            "telemetry.traces.endpoint.url".to_string(),
            "not a url".to_string(),
        );
        form.apply(TelemetryAction::SaveResult { errors });
        assert_eq!(form.errors().len(), 1);

        form.apply(TelemetryAction::SaveResult {
            errors: BTreeMap::new(),
        });
        assert!(form.errors().is_empty());
    }

    #[test]
    fn test_model_serializes_with_dotted_keys() {
        let data = TelemetryData {
            project_id: "_Root".to_string(),
            ..TelemetryData::default()
        };

        let json = serde_json::to_value(&data).expect("serializes");
        assert!(json["eventLogModel"]
            .get("telemetry.events.enabled")
            .is_some());
        assert!(json["tracesModel"]
            .get("telemetry.traces.endpoint.gzip")
            .is_some());
        assert_eq!(json["projectId"], "_Root");
    }

    #[test]
    fn test_inline_errors_found_without_errors_root() {
        let xml = r#"<response><error id="telemetry.metrics.enabled">nope</error></response>"#;
        let errors = all_inline_errors(xml).expect("parses");
        assert_eq!(errors["telemetry.metrics.enabled"], "nope");
    }

    pub(crate) mod support {
        use async_trait::async_trait;

        use crate::host::{RequestParams, Transport, TransportError};

        pub struct NullTransport;

        #[async_trait]
        impl Transport for NullTransport {
            async fn get(&self, _url: &str) -> Result<String, TransportError> {
                Ok(String::new())
            }

            async fn post_form(
                &self,
                _url: &str,
                _params: &RequestParams,
            ) -> Result<String, TransportError> {
                Ok(String::new())
            }

            async fn post_json(
                &self,
                _url: &str,
                _body: &serde_json::Value,
            ) -> Result<String, TransportError> {
                Ok(String::new())
            }
        }
    }
}
