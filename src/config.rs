//! # Connection Configuration
//!
//! The authoritative record for one AWS connection, handed to the form by
//! the host as an initialization payload. The field names match the JSON
//! object embedded in the server-rendered connection page, so the same
//! struct deserializes both host-supplied payloads and scraped pages.
//!
//! The configuration is never stored by the form beyond the current editing
//! session; the only mutation path is the form itself (and the key-rotation
//! splice, which writes the rotated key pair back).

use serde::{Deserialize, Serialize};

use crate::constants::{CONNECTIONS_TAB, DEFAULT_CLOSE_PATH};

/// Serialized region catalog: two parallel delimiter-encoded strings.
///
/// See [`crate::regions`] for the `,`/`#` escaping rule.
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
#[serde(rename_all = "camelCase", default)]
pub struct RegionCatalog {
    pub all_region_keys: String,
    pub all_region_values: String,
}

/// One AWS connection record as the admin server describes it.
///
/// String-typed flags (`session_credentials_enabled`) stay strings here:
/// the server renders them as `"true"`/`"false"`/empty and the field
/// registry owns the interpretation.
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ConnectionConfig {
    // Identity
    pub project_id: String,
    pub connection_id: String,
    pub display_name: String,
    pub feature_id: String,
    pub id: String,

    // Credential material
    pub credentials_type: String,
    pub access_key_id: String,
    /// Already encrypted with the server's public key; never plaintext.
    pub secret_access_key: String,
    pub session_credentials_enabled: String,
    pub sts_endpoint: String,
    pub iam_role_arn: String,
    pub iam_role_session_name: String,
    /// Upstream access-keys connection an IAM-role connection assumes from.
    pub aws_connection_id: String,

    // Region
    pub region: String,
    pub default_region: String,
    pub all_regions: RegionCatalog,

    // Availability
    pub build_steps_feature_enabled: bool,
    pub sub_projects_feature_enabled: bool,
    pub allowed_in_sub_projects_value: bool,
    pub allowed_in_builds_value: bool,

    // Server capabilities
    pub is_default_cred_provider_enabled: bool,
    /// RSA public key used to encrypt the secret before transmission.
    pub public_key: String,

    // Server-routed URLs for dependent operations
    pub connections_url: String,
    pub test_connection_url: String,
    pub supported_providers_url: String,
    pub available_aws_connections_controller_url: String,
    pub available_aws_connections_controller_resource: String,
    pub rotate_key_controller_url: String,
    pub external_ids_controller_url: String,
    /// Name of the query parameter identifying the connection on the
    /// external-id endpoint.
    pub external_ids_connection_param: String,
    /// Page embedding the `const config = {...}` literal for this
    /// connection; rotation re-fetches it to pick up the new key pair.
    pub connection_page_url: String,

    // Host cosmetics
    pub disable_type_selection: bool,
    pub read_only: bool,
    pub help_url_prefix: String,
}

impl ConnectionConfig {
    /// An existing connection is being edited iff the server assigned it an
    /// id already.
    pub fn is_edit(&self) -> bool {
        !self.connection_id.is_empty()
    }

    /// Location the form navigates to when closed without a host callback.
    pub fn default_close_location(&self) -> String {
        format!(
            "{DEFAULT_CLOSE_PATH}?projectId={}&tab={CONNECTIONS_TAB}",
            self.project_id
        )
    }

    /// Resolve a documentation page against the host's help-url prefix.
    pub fn resolve_help_url(&self, page: &str) -> String {
        let prefix = self.help_url_prefix.trim_end_matches('?');
        format!("{prefix}{page}")
    }
}

/// Display mode of the form. Cosmetic only: it decides whether the
/// provider-type selector is shown and how the submit action is labelled.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Mode {
    #[default]
    Default,
    /// Nested inside another settings form (e.g. the IAM-role upstream
    /// connection picker).
    Embedded,
    /// Converting a legacy credential record into a connection.
    Convert,
}

impl Mode {
    pub fn shows_provider_selector(self) -> bool {
        self == Mode::Default
    }

    pub fn submit_label(self, is_edit: bool) -> &'static str {
        match self {
            Mode::Convert => "Convert",
            _ if is_edit => "Save",
            _ => "Create",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_edit_mode_follows_connection_id() {
        let mut config = ConnectionConfig::default();
        assert!(!config.is_edit());

        config.connection_id = "awsConnection:r0".to_string();
        assert!(config.is_edit());
    }

    #[test]
    fn test_submit_label_per_mode() {
        assert_eq!(Mode::Default.submit_label(false), "Create");
        assert_eq!(Mode::Default.submit_label(true), "Save");
        assert_eq!(Mode::Embedded.submit_label(true), "Save");
        assert_eq!(Mode::Convert.submit_label(true), "Convert");
        assert_eq!(Mode::Convert.submit_label(false), "Convert");
    }

    #[test]
    fn test_only_default_mode_shows_provider_selector() {
        assert!(Mode::Default.shows_provider_selector());
        assert!(!Mode::Embedded.shows_provider_selector());
        assert!(!Mode::Convert.shows_provider_selector());
    }

    #[test]
    fn test_config_deserializes_from_camel_case() {
        let raw = r#"{
            "projectId": "_Root",
            "connectionId": "awsConnection:one",
            "allRegions": {
                "allRegionKeys": "us-east-1,eu-west-1",
                "allRegionValues": "US East,EU West"
            },
            "isDefaultCredProviderEnabled": true
        }"#;

        let config: ConnectionConfig = serde_json::from_str(raw).expect("valid config");
        assert_eq!(config.project_id, "_Root");
        assert!(config.is_edit());
        assert!(config.is_default_cred_provider_enabled);
        assert_eq!(config.all_regions.all_region_keys, "us-east-1,eu-west-1");
    }

    #[test]
    fn test_help_url_prefix_drops_trailing_question_mark() {
        let config = ConnectionConfig {
            help_url_prefix: "https://docs.example.com/help?".to_string(),
            ..ConnectionConfig::default()
        };
        assert_eq!(
            config.resolve_help_url("?configuring-connections#AmazonWebServices"),
            "https://docs.example.com/help?configuring-connections#AmazonWebServices"
        );
    }
}
