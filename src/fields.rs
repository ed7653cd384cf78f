//! # Field Registry
//!
//! Every form field's externally-visible name, value shape, and initial
//! value. Field names are the wire names of the save endpoint's request
//! parameters (`prop:`-prefixed for connection properties), so the
//! serializer maps them 1:1 without a translation table.
//!
//! The registry also owns error-key resolution: the server reports errors
//! under raw keys that match field names by suffix.

use std::collections::BTreeMap;
use std::fmt;
use std::sync::LazyLock;

use serde::{Deserialize, Serialize};

use crate::config::ConnectionConfig;
use crate::constants::{AWS_PROVIDER_NAME, DEFAULT_SESSION_NAME, PASSWORD_STUB_LEN};
use crate::credentials::credentials_type_options;
use crate::regions::{initial_region, region_options, sts_endpoint_for_region};

/// Placeholder shown instead of an already-saved secret. The serializer
/// recognizes it and resends the stored encrypted value instead of
/// encrypting bullets.
pub static PASSWORD_STUB: LazyLock<String> =
    LazyLock::new(|| "\u{2022}".repeat(PASSWORD_STUB_LEN));

/// A selectable key/label pair, as used by every selector field.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
pub struct OptionItem {
    pub key: String,
    pub label: String,
}

impl OptionItem {
    pub fn new(key: impl Into<String>, label: impl Into<String>) -> Self {
        Self {
            key: key.into(),
            label: label.into(),
        }
    }
}

/// Closed set of form field names. The declaration order is load-bearing
/// for error-key resolution: the first suffix match wins.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum FieldName {
    ProviderType,
    DisplayName,
    FeatureId,
    Id,
    ConnectionId,
    Region,
    CredentialsType,
    AccessKeyId,
    SecretAccessKey,
    SessionCredentials,
    StsEndpoint,
    IamRoleArn,
    AwsConnectionId,
    IamRoleSessionName,
    AllowedInBuilds,
    AllowedInSubProjects,
    ExternalId,
}

impl FieldName {
    /// All fields, in resolution order.
    pub const ALL: [FieldName; 17] = [
        FieldName::ProviderType,
        FieldName::DisplayName,
        FieldName::FeatureId,
        FieldName::Id,
        FieldName::ConnectionId,
        FieldName::Region,
        FieldName::CredentialsType,
        FieldName::AccessKeyId,
        FieldName::SecretAccessKey,
        FieldName::SessionCredentials,
        FieldName::StsEndpoint,
        FieldName::IamRoleArn,
        FieldName::AwsConnectionId,
        FieldName::IamRoleSessionName,
        FieldName::AllowedInBuilds,
        FieldName::AllowedInSubProjects,
        FieldName::ExternalId,
    ];

    /// Wire name used as the request parameter key.
    pub fn as_str(self) -> &'static str {
        match self {
            FieldName::ProviderType => "__providerType",
            FieldName::DisplayName => "prop:displayName",
            FieldName::FeatureId => "prop:featureId",
            FieldName::Id => "prop:id",
            FieldName::ConnectionId => "connectionId",
            FieldName::Region => "prop:awsRegionName",
            FieldName::CredentialsType => "prop:awsCredentialsType",
            FieldName::AccessKeyId => "prop:awsAccessKeyId",
            FieldName::SecretAccessKey => "prop:encrypted:secure:awsSecretAccessKey",
            FieldName::SessionCredentials => "prop:awsSessionCredentials",
            FieldName::StsEndpoint => "prop:awsStsEndpoint",
            FieldName::IamRoleArn => "prop:awsIamRoleArn",
            FieldName::AwsConnectionId => "prop:awsConnectionId",
            FieldName::IamRoleSessionName => "prop:awsIamRoleSessionName",
            FieldName::AllowedInBuilds => "prop:forBuilds",
            FieldName::AllowedInSubProjects => "prop:awsAllowedInSubProjects",
            FieldName::ExternalId => "prop:awsIamRoleExternalId",
        }
    }

    /// Resolve a server-reported error key to a field. Keys match by
    /// suffix; the special key `unexpected` always lands on the
    /// connection-id field so even non-field failures get a visible error
    /// state. Unknown keys resolve to nothing.
    pub fn resolve_error_key(key: &str) -> Option<FieldName> {
        if key == "unexpected" {
            return Some(FieldName::ConnectionId);
        }

        FieldName::ALL
            .iter()
            .copied()
            .find(|field| field.as_str().ends_with(key))
    }
}

impl fmt::Display for FieldName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A single field's current value.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FieldValue {
    Text(String),
    Flag(bool),
    Choice(OptionItem),
}

impl FieldValue {
    pub fn text(value: impl Into<String>) -> Self {
        FieldValue::Text(value.into())
    }

    pub fn choice(key: impl Into<String>, label: impl Into<String>) -> Self {
        FieldValue::Choice(OptionItem::new(key, label))
    }

    pub fn as_text(&self) -> Option<&str> {
        match self {
            FieldValue::Text(value) => Some(value),
            _ => None,
        }
    }

    /// The raw key of the value: a text value is its own key, a choice
    /// unwraps to its key. Used to normalize the credential-type
    /// discriminator, which may hold either shape.
    pub fn raw_key(&self) -> Option<&str> {
        match self {
            FieldValue::Text(value) => Some(value),
            FieldValue::Choice(option) => Some(&option.key),
            FieldValue::Flag(_) => None,
        }
    }
}

/// Live form state keyed by field. `None` is an unset field, serialized as
/// an explicit null ("clear this field").
pub type FormValues = BTreeMap<FieldName, Option<FieldValue>>;

fn text_or_unset(value: &str) -> Option<FieldValue> {
    if value.is_empty() {
        None
    } else {
        Some(FieldValue::text(value))
    }
}

/// Compute the initial [`FormValues`] for a configuration.
///
/// `provider_option` is the server-reported provider entry for AWS, when
/// the supported-providers lookup already produced one; the fixed provider
/// name is the fallback.
pub fn seed_form_values(
    config: &ConnectionConfig,
    provider_option: Option<OptionItem>,
) -> FormValues {
    let regions = region_options(&config.all_regions);
    let region = initial_region(config, &regions);

    let credential_options = credentials_type_options();
    let credentials_type = credential_options
        .iter()
        .find(|option| option.key == config.credentials_type)
        .or_else(|| credential_options.first())
        .cloned();

    let display_name = if config.display_name.is_empty() {
        AWS_PROVIDER_NAME.to_string()
    } else {
        config.display_name.clone()
    };

    let sts_endpoint = if config.sts_endpoint.is_empty() {
        region
            .as_ref()
            .map(|option| sts_endpoint_for_region(&option.key))
    } else {
        Some(config.sts_endpoint.clone())
    };

    let session_credentials = if config.session_credentials_enabled.is_empty() {
        true
    } else {
        config.session_credentials_enabled == "true"
    };

    let session_name = if config.iam_role_session_name.is_empty() {
        DEFAULT_SESSION_NAME.to_string()
    } else {
        config.iam_role_session_name.clone()
    };

    let secret_placeholder = if config.secret_access_key.is_empty() {
        None
    } else {
        Some(FieldValue::text(PASSWORD_STUB.as_str()))
    };

    let mut values = FormValues::new();
    values.insert(
        FieldName::ProviderType,
        Some(
            provider_option
                .map(FieldValue::Choice)
                .unwrap_or_else(|| FieldValue::text(AWS_PROVIDER_NAME)),
        ),
    );
    values.insert(FieldName::DisplayName, Some(FieldValue::text(display_name)));
    values.insert(FieldName::ConnectionId, text_or_unset(&config.connection_id));
    values.insert(FieldName::Region, region.map(FieldValue::Choice));
    values.insert(
        FieldName::CredentialsType,
        credentials_type.map(FieldValue::Choice),
    );
    values.insert(FieldName::AccessKeyId, text_or_unset(&config.access_key_id));
    values.insert(FieldName::SecretAccessKey, secret_placeholder);
    values.insert(
        FieldName::SessionCredentials,
        Some(FieldValue::Flag(session_credentials)),
    );
    values.insert(
        FieldName::StsEndpoint,
        sts_endpoint.map(FieldValue::Text),
    );
    values.insert(
        FieldName::IamRoleSessionName,
        Some(FieldValue::text(session_name)),
    );
    values.insert(FieldName::IamRoleArn, text_or_unset(&config.iam_role_arn));
    values.insert(
        FieldName::AllowedInSubProjects,
        Some(FieldValue::Flag(config.allowed_in_sub_projects_value)),
    );
    values.insert(
        FieldName::AllowedInBuilds,
        Some(FieldValue::Flag(config.allowed_in_builds_value)),
    );
    values.insert(FieldName::Id, text_or_unset(&config.id));

    values
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::RegionCatalog;
    use crate::credentials::CredentialsType;

    fn config_with_regions() -> ConnectionConfig {
        ConnectionConfig {
            all_regions: RegionCatalog {
                all_region_keys: "us-east-1,cn-north-1".to_string(),
                all_region_values: "US East,China (Beijing)".to_string(),
            },
            ..ConnectionConfig::default()
        }
    }

    #[test]
    fn test_password_stub_is_forty_bullets() {
        assert_eq!(PASSWORD_STUB.chars().count(), 40);
        assert!(PASSWORD_STUB.chars().all(|c| c == '\u{2022}'));
    }

    #[test]
    fn test_seed_defaults_for_fresh_config() {
        let values = seed_form_values(&config_with_regions(), None);

        assert_eq!(
            values[&FieldName::DisplayName],
            Some(FieldValue::text("Amazon Web Services (AWS)"))
        );
        assert_eq!(values[&FieldName::ConnectionId], None);
        assert_eq!(
            values[&FieldName::CredentialsType]
                .as_ref()
                .and_then(FieldValue::raw_key),
            Some(CredentialsType::AccessKeys.key())
        );
        assert_eq!(
            values[&FieldName::StsEndpoint],
            Some(FieldValue::text("https://sts.us-east-1.amazonaws.com"))
        );
        assert_eq!(
            values[&FieldName::SessionCredentials],
            Some(FieldValue::Flag(true))
        );
        assert_eq!(
            values[&FieldName::IamRoleSessionName],
            Some(FieldValue::text("BuildServer-session"))
        );
        assert_eq!(values[&FieldName::SecretAccessKey], None);
    }

    #[test]
    fn test_seed_respects_existing_values() {
        let mut config = config_with_regions();
        config.display_name = "Prod deployer".to_string();
        config.region = "cn-north-1".to_string();
        config.session_credentials_enabled = "false".to_string();
        config.secret_access_key = "encrypted-blob".to_string();

        let values = seed_form_values(&config, None);

        assert_eq!(
            values[&FieldName::DisplayName],
            Some(FieldValue::text("Prod deployer"))
        );
        assert_eq!(
            values[&FieldName::Region]
                .as_ref()
                .and_then(FieldValue::raw_key),
            Some("cn-north-1")
        );
        assert_eq!(
            values[&FieldName::StsEndpoint],
            Some(FieldValue::text("https://sts.cn-north-1.amazonaws.com.cn"))
        );
        assert_eq!(
            values[&FieldName::SessionCredentials],
            Some(FieldValue::Flag(false))
        );
        assert_eq!(
            values[&FieldName::SecretAccessKey],
            Some(FieldValue::text(PASSWORD_STUB.as_str()))
        );
    }

    #[test]
    fn test_seed_prefers_server_reported_provider() {
        let provider = OptionItem::new("AWS", "Amazon Web Services");
        let values = seed_form_values(&config_with_regions(), Some(provider.clone()));
        assert_eq!(
            values[&FieldName::ProviderType],
            Some(FieldValue::Choice(provider))
        );
    }

    #[test]
    fn test_error_key_resolution_by_suffix() {
        assert_eq!(
            FieldName::resolve_error_key("displayName"),
            Some(FieldName::DisplayName)
        );
        assert_eq!(
            FieldName::resolve_error_key("prop:awsRegionName"),
            Some(FieldName::Region)
        );
        assert_eq!(
            FieldName::resolve_error_key("awsConnectionId"),
            Some(FieldName::AwsConnectionId)
        );
        assert_eq!(FieldName::resolve_error_key("somethingElse"), None);
    }

    #[test]
    fn test_unexpected_error_key_lands_on_connection_id() {
        assert_eq!(
            FieldName::resolve_error_key("unexpected"),
            Some(FieldName::ConnectionId)
        );
    }

    #[test]
    fn test_connection_id_suffix_does_not_hit_upstream_connection_field() {
        // `connectionId` must resolve to the connection-id field itself, not
        // to `prop:awsConnectionId` (case-sensitive suffix).
        assert_eq!(
            FieldName::resolve_error_key("connectionId"),
            Some(FieldName::ConnectionId)
        );
    }
}
