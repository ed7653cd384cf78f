//! # Form Orchestrator
//!
//! Owns the lifecycle of one connection form: seeding from the
//! configuration, field edits, submit, test-connection, key rotation, and
//! close. All server interaction goes through the host [`Transport`]; all
//! secret handling goes through the host [`SecretEncryptor`].
//!
//! Error surfaces follow the product's taxonomy: per-field errors are
//! recorded on the form and shown inline; transport and encryption
//! failures bubble out of the operation as [`FormError`] for the host's
//! generic alert; test and rotation outcomes are ordinary return values
//! because they render in their own dedicated spots.

use std::sync::Arc;

use serde::Deserialize;
use thiserror::Error;
use tracing::{debug, info, warn};

use crate::config::{ConnectionConfig, Mode};
use crate::constants::TEST_CONNECTION_PATH;
use crate::credentials::CredentialsPanel;
use crate::fields::{seed_form_values, FieldName, FieldValue, FormValues, OptionItem};
use crate::host::{EncryptError, SecretEncryptor, Transport, TransportError};
use crate::regions::sts_endpoint_for_region;
use crate::remote::{GeneratedIdSource, SupportedProvidersSource};
use crate::response::{
    errors_from_response, field_errors, interpret_test_response, FieldErrors, ResponseError,
    TestOutcome,
};
use crate::scrape::fetch_connection_config;
use crate::serializer::to_request_params;

/// Failure of a form operation that is not tied to a field: the host shows
/// these as a transient alert. Field-level errors never appear here; they
/// are recorded on the form instead.
#[derive(Debug, Error)]
pub enum FormError {
    #[error(transparent)]
    Transport(#[from] TransportError),

    #[error(transparent)]
    Encrypt(#[from] EncryptError),

    #[error(transparent)]
    Response(#[from] ResponseError),

    #[error("unexpected server response: {0}")]
    UnexpectedJson(#[from] serde_json::Error),
}

/// Result of a submit.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SubmitOutcome {
    /// Persisted. Carries the record's identity for hosts that update a
    /// surrounding selector before closing the dialog.
    Saved {
        connection_id: String,
        display_name: String,
    },
    /// The server rejected specific fields; the same map is recorded on
    /// the form for inline display.
    Invalid(FieldErrors),
}

/// Result of a key rotation. Failures are inline and non-fatal: the
/// previous key pair stays valid and displayed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RotationOutcome {
    Rotated,
    Failed { message: String },
}

/// What the host should do after a close request.
#[derive(Debug)]
pub enum CloseAction {
    /// The host-supplied close callback ran.
    Handled,
    /// No callback: navigate to the project's connection settings.
    Redirect(String),
}

#[derive(Debug, Deserialize)]
struct RotationResponse {
    #[serde(default)]
    errors: Vec<RotationError>,
}

#[derive(Debug, Deserialize)]
struct RotationError {
    #[serde(default)]
    message: String,
}

const ROTATION_REFETCH_FAILED: &str =
    "Failed to receive a server response describing the updated connection";

type CloseCallback = Box<dyn Fn() + Send + Sync>;

/// One rendered connection form.
pub struct ConnectionForm {
    config: ConnectionConfig,
    mode: Mode,
    values: FormValues,
    field_errors: FieldErrors,
    transport: Arc<dyn Transport>,
    encryptor: Arc<dyn SecretEncryptor>,
    generated_id: GeneratedIdSource,
    generated_id_triggered: bool,
    on_close: Option<CloseCallback>,
}

impl std::fmt::Debug for ConnectionForm {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ConnectionForm")
            .field("connection_id", &self.config.connection_id)
            .field("mode", &self.mode)
            .field("field_errors", &self.field_errors)
            .finish_non_exhaustive()
    }
}

impl ConnectionForm {
    pub fn new(
        config: ConnectionConfig,
        mode: Mode,
        transport: Arc<dyn Transport>,
        encryptor: Arc<dyn SecretEncryptor>,
    ) -> Self {
        let values = seed_form_values(&config, None);
        let generated_id = GeneratedIdSource::new(Arc::clone(&transport), &config);

        info!(
            project_id = %config.project_id,
            edit = config.is_edit(),
            "initialized connection form"
        );

        Self {
            config,
            mode,
            values,
            field_errors: FieldErrors::new(),
            transport,
            encryptor,
            generated_id,
            generated_id_triggered: false,
            on_close: None,
        }
    }

    /// Install a host close callback; without one, [`Self::close`] yields a
    /// redirect to the default settings location.
    pub fn with_on_close(mut self, callback: impl Fn() + Send + Sync + 'static) -> Self {
        self.on_close = Some(Box::new(callback));
        self
    }

    pub fn config(&self) -> &ConnectionConfig {
        &self.config
    }

    pub fn mode(&self) -> Mode {
        self.mode
    }

    pub fn values(&self) -> &FormValues {
        &self.values
    }

    pub fn field_errors(&self) -> &FieldErrors {
        &self.field_errors
    }

    /// A form without a server-assigned connection id creates a new record.
    pub fn is_create_mode(&self) -> bool {
        !self.config.is_edit()
    }

    /// The connection id is chosen at creation and immutable afterwards.
    pub fn connection_id_editable(&self) -> bool {
        self.is_create_mode()
    }

    pub fn submit_label(&self) -> &'static str {
        self.mode.submit_label(self.config.is_edit())
    }

    /// The provider-type selector shows only in the default display mode,
    /// and hosts embedding the form for a fixed provider suppress it.
    pub fn provider_selector_visible(&self) -> bool {
        self.mode.shows_provider_selector() && !self.config.disable_type_selection
    }

    pub fn value(&self, field: FieldName) -> Option<&FieldValue> {
        self.values.get(&field).and_then(|value| value.as_ref())
    }

    /// Write a field. Editing a field retracts its recorded error.
    pub fn set_value(&mut self, field: FieldName, value: Option<FieldValue>) {
        self.field_errors.remove(&field);
        self.values.insert(field, value);
    }

    /// Region selection also recomputes the STS endpoint for the new
    /// region's partition.
    pub fn select_region(&mut self, region: OptionItem) {
        let endpoint = sts_endpoint_for_region(&region.key);
        self.set_value(FieldName::Region, Some(FieldValue::Choice(region)));
        self.set_value(FieldName::StsEndpoint, Some(FieldValue::Text(endpoint)));
    }

    /// The credential-type sub-form for the current discriminator value.
    pub fn panel(&self) -> CredentialsPanel {
        CredentialsPanel::resolve(&self.config, &self.values)
    }

    /// Adopt the server-reported provider entry once the supported
    /// providers source has loaded.
    pub fn apply_supported_providers(&mut self, providers: &SupportedProvidersSource) {
        if let Some(option) = providers.provider(crate::constants::AWS_PROVIDER_KEY) {
            self.values
                .insert(FieldName::ProviderType, Some(FieldValue::Choice(option)));
        }
    }

    /// Record a display-name edit. In create mode the server derives a
    /// connection-id candidate from the new name; the latest response wins.
    pub async fn display_name_changed(&mut self, name: &str) -> Result<(), FormError> {
        self.set_value(FieldName::DisplayName, Some(FieldValue::text(name)));

        if !self.is_create_mode() {
            return Ok(());
        }

        match self.generated_id.generate(name).await {
            Ok(Some(id)) => {
                self.set_value(FieldName::ConnectionId, Some(FieldValue::Text(id)));
                Ok(())
            }
            // A newer name edit is already in flight; its result will land.
            Ok(None) => Ok(()),
            Err(err) => Err(err.into()),
        }
    }

    /// One-shot startup trigger: when the form opens in create mode with a
    /// prefilled display name and no id yet, derive an id once.
    pub async fn ensure_initial_generated_id(&mut self) {
        if self.generated_id_triggered {
            return;
        }

        let display_name = self
            .value(FieldName::DisplayName)
            .and_then(FieldValue::as_text)
            .unwrap_or_default()
            .to_string();
        let id_unset = self.value(FieldName::ConnectionId).is_none();

        if self.is_create_mode() && !display_name.is_empty() && id_unset {
            match self.generated_id.generate(&display_name).await {
                Ok(Some(id)) => {
                    self.set_value(FieldName::ConnectionId, Some(FieldValue::Text(id)));
                }
                Ok(None) => {}
                Err(err) => warn!(%err, "initial id generation failed"),
            }
            self.generated_id_triggered = true;
        }
    }

    /// Persist the form. Field rejections land in [`Self::field_errors`]
    /// and in the returned outcome; everything else is a generic error.
    pub async fn submit(&mut self) -> Result<SubmitOutcome, FormError> {
        self.field_errors.clear();

        let mut data = self.values.clone();

        // A missing connection id in the config means we are creating: the
        // chosen id moves into the id property and the connection-id
        // parameter is cleared. (The upstream awsConnectionId field is an
        // entirely different thing and is untouched here.)
        if self.config.connection_id.is_empty() {
            let chosen = data.get(&FieldName::ConnectionId).cloned().flatten();
            data.insert(FieldName::Id, chosen);
            data.insert(FieldName::ConnectionId, None);
        }

        let params = to_request_params(&self.config, &data, self.encryptor.as_ref())?;
        let body = self
            .transport
            .post_form(&self.config.connections_url, &params)
            .await?;

        if let Some(errors) = errors_from_response(&body)? {
            let projected = field_errors(&errors);
            warn!(count = projected.len(), "save rejected with field errors");
            self.field_errors = projected.clone();
            return Ok(SubmitOutcome::Invalid(projected));
        }

        let connection_id = if self.config.connection_id.is_empty() {
            data.get(&FieldName::Id)
                .cloned()
                .flatten()
                .and_then(|value| value.as_text().map(str::to_string))
                .unwrap_or_default()
        } else {
            self.config.connection_id.clone()
        };
        let display_name = self
            .value(FieldName::DisplayName)
            .and_then(FieldValue::as_text)
            .unwrap_or_default()
            .to_string();

        info!(%connection_id, "connection saved");
        Ok(SubmitOutcome::Saved {
            connection_id,
            display_name,
        })
    }

    /// Probe the credentials currently in the form without persisting
    /// anything. The outcome renders in its own dialog and never blocks or
    /// mutates the form.
    pub async fn test_connection(&self) -> Result<TestOutcome, FormError> {
        let params = to_request_params(&self.config, &self.values, self.encryptor.as_ref())?;
        let body = self
            .transport
            .post_form(TEST_CONNECTION_PATH, &params)
            .await?;

        let outcome = interpret_test_response(&body)?;
        debug!(success = outcome.success, "test connection finished");
        Ok(outcome)
    }

    /// Rotate the stored access keys. On success the refreshed key pair is
    /// spliced into the live configuration so subsequent edits and tests
    /// use it; on failure nothing changes.
    pub async fn rotate_keys(&mut self) -> Result<RotationOutcome, FormError> {
        let mut params = crate::host::RequestParams::new();
        params.insert(
            "connectionId".to_string(),
            Some(self.config.connection_id.clone()),
        );
        params.insert(
            "projectId".to_string(),
            Some(self.config.project_id.clone()),
        );

        let body = self
            .transport
            .post_form(&self.config.rotate_key_controller_url, &params)
            .await?;
        let response: RotationResponse = serde_json::from_str(&body)?;

        if let Some(first) = response.errors.first() {
            warn!(message = %first.message, "key rotation rejected");
            return Ok(RotationOutcome::Failed {
                message: first.message.clone(),
            });
        }

        let refreshed = fetch_connection_config(
            self.transport.as_ref(),
            &self.config.connection_page_url,
            &self.config.project_id,
            &self.config.connection_id,
        )
        .await;

        match refreshed {
            Ok(updated) => {
                info!(connection_id = %self.config.connection_id, "keys rotated");
                self.config.access_key_id = updated.access_key_id;
                self.config.secret_access_key = updated.secret_access_key;
                Ok(RotationOutcome::Rotated)
            }
            Err(err) => {
                warn!(%err, "rotated but could not reload the connection record");
                Ok(RotationOutcome::Failed {
                    message: ROTATION_REFETCH_FAILED.to_string(),
                })
            }
        }
    }

    /// Close the form: run the host callback when one was supplied,
    /// otherwise hand back the default settings location.
    pub fn close(&self) -> CloseAction {
        match &self.on_close {
            Some(callback) => {
                callback();
                CloseAction::Handled
            }
            None => CloseAction::Redirect(self.config.default_close_location()),
        }
    }
}
