//! # Credential Types
//!
//! The three-way discriminator deciding which sub-form is live, and the
//! typed view state each sub-form exposes to the host.
//!
//! Switching the discriminator never clears field values; the serializer
//! nulls the fields of the non-selected variants at submit time, so a user
//! can flip between variants without losing input.

use crate::config::ConnectionConfig;
use crate::constants::CONNECTIONS_HELP_PAGE;
use crate::fields::{FieldName, FieldValue, FormValues, OptionItem};

/// How a connection obtains credentials.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CredentialsType {
    /// A stored access-key/secret pair.
    AccessKeys,
    /// A role assumed from an upstream access-keys connection.
    IamRole,
    /// The server host's default credential provider chain.
    DefaultProvider,
}

impl CredentialsType {
    /// Stable wire key stored in `prop:awsCredentialsType`.
    pub fn key(self) -> &'static str {
        match self {
            CredentialsType::AccessKeys => "awsAccessKeys",
            CredentialsType::IamRole => "awsAssumeIamRole",
            CredentialsType::DefaultProvider => "defaultProvider",
        }
    }

    pub fn label(self) -> &'static str {
        match self {
            CredentialsType::AccessKeys => "Access keys",
            CredentialsType::IamRole => "IAM role",
            CredentialsType::DefaultProvider => "Default Credential Provider Chain",
        }
    }

    pub fn from_key(key: &str) -> Option<CredentialsType> {
        match key {
            "awsAccessKeys" => Some(CredentialsType::AccessKeys),
            "awsAssumeIamRole" => Some(CredentialsType::IamRole),
            "defaultProvider" => Some(CredentialsType::DefaultProvider),
            _ => None,
        }
    }
}

/// The fixed selector contents, in presentation order. The first entry is
/// also the seeding default.
pub fn credentials_type_options() -> Vec<OptionItem> {
    [
        CredentialsType::AccessKeys,
        CredentialsType::IamRole,
        CredentialsType::DefaultProvider,
    ]
    .into_iter()
    .map(|ty| OptionItem::new(ty.key(), ty.label()))
    .collect()
}

/// The currently selected type, normalized from the discriminator field.
/// The field may hold a raw key or a selector option; an unrecognized tag
/// (or a missing field) yields `None`.
pub fn selected_credentials_type(values: &FormValues) -> Option<CredentialsType> {
    values
        .get(&FieldName::CredentialsType)
        .and_then(|value| value.as_ref())
        .and_then(FieldValue::raw_key)
        .and_then(CredentialsType::from_key)
}

/// Typed view state of the credential-type sub-form. Exactly one panel is
/// live at a time; an unrecognized discriminator renders nothing.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CredentialsPanel {
    AccessKeys {
        /// The rotate action is offered only for keys that were actually
        /// saved: edit mode with both key id and secret present in the
        /// stored record.
        rotation_available: bool,
    },
    IamRole {
        /// The external-id block appears once an upstream connection is
        /// selected.
        external_id_visible: bool,
    },
    DefaultProvider {
        /// Server capability gate, not a user input. When the chain is
        /// disabled the panel shows a notice pointing at `doc_url`.
        chain_enabled: bool,
        doc_url: String,
    },
    Hidden,
}

impl CredentialsPanel {
    /// Resolve the panel for the current form state.
    pub fn resolve(config: &ConnectionConfig, values: &FormValues) -> CredentialsPanel {
        match selected_credentials_type(values) {
            Some(CredentialsType::AccessKeys) => CredentialsPanel::AccessKeys {
                rotation_available: config.is_edit()
                    && !config.access_key_id.is_empty()
                    && !config.secret_access_key.is_empty(),
            },
            Some(CredentialsType::IamRole) => CredentialsPanel::IamRole {
                external_id_visible: values
                    .get(&FieldName::AwsConnectionId)
                    .and_then(|value| value.as_ref())
                    .and_then(FieldValue::raw_key)
                    .is_some_and(|key| !key.is_empty()),
            },
            Some(CredentialsType::DefaultProvider) => CredentialsPanel::DefaultProvider {
                chain_enabled: config.is_default_cred_provider_enabled,
                doc_url: config.resolve_help_url(CONNECTIONS_HELP_PAGE),
            },
            None => CredentialsPanel::Hidden,
        }
    }
}
