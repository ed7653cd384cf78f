//! AWS Connection Manager Library
//!
//! Embeddable settings engine for the AWS credential connections of a
//! build server's administration UI.
//!
//! ## Overview
//!
//! The engine is a thin data-binding layer over the admin server's HTTP
//! contract:
//!
//! 1. **Seeding** - A [`config::ConnectionConfig`] (host-supplied or
//!    scraped from the rendered connection page) seeds the form values
//!    through the field registry.
//! 2. **Editing** - Field edits, region-driven STS endpoint derivation,
//!    and the three-way credential-type sub-form selection.
//! 3. **Serialization** - Form values become flat request parameters with
//!    explicit nulls, client-side secret encryption, and cross-variant
//!    field clearing.
//! 4. **Interpretation** - XML responses map back onto per-field errors or
//!    a caller identity.
//! 5. **Flows** - Submit, non-blocking test connection, and key rotation
//!    with a config splice-back.
//!
//! The host supplies two capabilities: an HTTP [`host::Transport`] and a
//! [`host::SecretEncryptor`] for the server's public-key secret scheme.
//! Everything else is plain state the host can render however it likes.
//!
//! A smaller telemetry-configuration form ([`telemetry`]) shares the
//! transport and the inline-XML error convention.

pub mod config;
pub mod constants;
pub mod credentials;
pub mod fields;
pub mod form;
pub mod host;
pub mod regions;
pub mod remote;
pub mod response;
pub mod scrape;
pub mod serializer;
pub mod telemetry;

pub use config::{ConnectionConfig, Mode, RegionCatalog};
pub use credentials::{CredentialsPanel, CredentialsType};
pub use fields::{FieldName, FieldValue, FormValues, OptionItem};
pub use form::{CloseAction, ConnectionForm, FormError, RotationOutcome, SubmitOutcome};
pub use host::{HttpTransport, SecretEncryptor, Transport, TransportError};
pub use response::{CallerIdentity, FieldErrors, TestOutcome};
pub use scrape::scrape_connection_page;
pub use telemetry::{TelemetryAction, TelemetryData, TelemetryForm, TelemetryUrls};
