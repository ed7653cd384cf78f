//! # Serializer
//!
//! Maps the live form values onto the flat request-parameter map the save
//! and test endpoints expect.
//!
//! Two rules are easy to get wrong and are enforced here, not in the
//! orchestrator:
//!
//! - The secret field resends the stored, already-encrypted secret when its
//!   value still equals the bullet placeholder (the user made no edit);
//!   any other value is plaintext and must go through the host encryptor.
//! - Fields belonging to the credential-type variants that are NOT
//!   currently selected are nulled out, so stale values from a previously
//!   selected type never leak into the persisted record.

use tracing::debug;
use zeroize::Zeroizing;

use crate::config::ConnectionConfig;
use crate::constants::{AWS_PROVIDER_KEY, SAVE_CONNECTION_MARKER};
use crate::credentials::CredentialsType;
use crate::fields::{FieldName, FieldValue, FormValues, PASSWORD_STUB};
use crate::host::{EncryptError, RequestParams, SecretEncryptor};

/// Serialize `values` for submission.
///
/// Unset fields serialize as explicit nulls: the server clears them rather
/// than keeping the previous value.
pub fn to_request_params(
    config: &ConnectionConfig,
    values: &FormValues,
    encryptor: &dyn SecretEncryptor,
) -> Result<RequestParams, EncryptError> {
    let mut params = RequestParams::new();
    params.insert("projectId".to_string(), Some(config.project_id.clone()));
    params.insert(
        "saveConnection".to_string(),
        Some(SAVE_CONNECTION_MARKER.to_string()),
    );
    params.insert(
        "providerType".to_string(),
        Some(AWS_PROVIDER_KEY.to_string()),
    );

    for (field, value) in values {
        let key = field.as_str().to_string();
        let serialized = match value {
            None => None,
            Some(FieldValue::Text(text)) if *field == FieldName::SecretAccessKey => {
                Some(serialize_secret(config, text, encryptor)?)
            }
            Some(FieldValue::Text(text)) => Some(text.clone()),
            Some(FieldValue::Flag(flag)) => Some(flag.to_string()),
            Some(FieldValue::Choice(option)) => Some(option.key.clone()),
        };
        params.insert(key, serialized);
    }

    null_out_unselected_variants(&mut params);

    debug!(fields = params.len(), "serialized connection form");
    Ok(params)
}

fn serialize_secret(
    config: &ConnectionConfig,
    value: &str,
    encryptor: &dyn SecretEncryptor,
) -> Result<String, EncryptError> {
    if value == PASSWORD_STUB.as_str() {
        // Untouched placeholder: resend what the server gave us.
        return Ok(config.secret_access_key.clone());
    }

    let plaintext = Zeroizing::new(value.to_string());
    encryptor.encrypt(&plaintext, &config.public_key)
}

/// Null the credential fields of every variant except the selected one.
/// An unrecognized (or missing) type keeps nothing.
fn null_out_unselected_variants(params: &mut RequestParams) {
    let selected = params
        .get(FieldName::CredentialsType.as_str())
        .and_then(|value| value.as_deref())
        .and_then(CredentialsType::from_key);

    let cleared: &[FieldName] = match selected {
        Some(CredentialsType::AccessKeys) => {
            &[FieldName::IamRoleArn, FieldName::AwsConnectionId]
        }
        Some(CredentialsType::IamRole) => {
            &[FieldName::AccessKeyId, FieldName::SecretAccessKey]
        }
        _ => &[
            FieldName::AccessKeyId,
            FieldName::SecretAccessKey,
            FieldName::IamRoleArn,
            FieldName::AwsConnectionId,
        ],
    };

    for field in cleared {
        params.insert(field.as_str().to_string(), None);
    }
}
