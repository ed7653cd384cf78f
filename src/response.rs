//! # Response Interpreter
//!
//! The save and test endpoints answer with small XML documents:
//!
//! ```xml
//! <errors><error id="prop:displayName">Display name is mandatory</error></errors>
//! <callerIdentity accountId="1" userId="2" userArn="arn:aws:iam::1:user/u"/>
//! ```
//!
//! This module extracts the inline error map and the caller identity, and
//! projects raw error keys onto form fields. Keys that resolve to no field
//! are dropped silently; the generic alert surface belongs to the
//! orchestrator.

use std::collections::BTreeMap;

use roxmltree::Document;
use thiserror::Error;

use crate::constants::TEST_CONNECTION_PREFIX;
use crate::fields::FieldName;

/// Raw error map as reported by the server: error id → message text.
pub type ResponseErrors = BTreeMap<String, String>;

/// Per-field error map after key resolution.
pub type FieldErrors = BTreeMap<FieldName, String>;

#[derive(Debug, Error)]
pub enum ResponseError {
    #[error("malformed server response: {0}")]
    Xml(#[from] roxmltree::Error),
}

/// Caller identity reported by a successful connection test.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CallerIdentity {
    pub account_id: String,
    pub user_id: String,
    pub user_arn: String,
}

fn collect_errors(doc: &Document<'_>) -> Option<ResponseErrors> {
    let mut errors = ResponseErrors::new();

    for node in doc.descendants().filter(|n| n.has_tag_name("error")) {
        let under_errors_root = node
            .parent_element()
            .is_some_and(|parent| parent.has_tag_name("errors"));
        if !under_errors_root {
            continue;
        }

        let id = node.attribute("id").unwrap_or_default().to_string();
        let message = node.text().unwrap_or_default().to_string();
        errors.insert(id, message);
    }

    if errors.is_empty() {
        None
    } else {
        Some(errors)
    }
}

fn find_caller_identity(doc: &Document<'_>) -> Option<CallerIdentity> {
    doc.descendants()
        .find(|n| n.has_tag_name("callerIdentity"))
        .map(|node| CallerIdentity {
            account_id: node.attribute("accountId").unwrap_or_default().to_string(),
            user_id: node.attribute("userId").unwrap_or_default().to_string(),
            user_arn: node.attribute("userArn").unwrap_or_default().to_string(),
        })
}

/// Extract the inline error map, or `None` when the response carries no
/// `<errors>` block (success).
pub fn errors_from_response(xml: &str) -> Result<Option<ResponseErrors>, ResponseError> {
    let doc = Document::parse(xml)?;
    Ok(collect_errors(&doc))
}

/// Project raw error keys onto fields via the registry's suffix rule.
/// Unresolvable keys are dropped.
pub fn field_errors(errors: &ResponseErrors) -> FieldErrors {
    errors
        .iter()
        .filter_map(|(key, message)| {
            FieldName::resolve_error_key(key).map(|field| (field, message.clone()))
        })
        .collect()
}

/// Outcome of a connection test, ready for the non-blocking result dialog.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TestOutcome {
    pub success: bool,
    pub message: String,
}

/// Interpret the test endpoint's response.
///
/// A caller identity wins over any error block; an error block without an
/// identity fails with the joined messages; a response with neither is
/// still a success, with a note that the identity could not be read.
pub fn interpret_test_response(xml: &str) -> Result<TestOutcome, ResponseError> {
    let doc = Document::parse(xml)?;

    if let Some(identity) = find_caller_identity(&doc) {
        return Ok(TestOutcome {
            success: true,
            message: format!(
                "{TEST_CONNECTION_PREFIX}Caller Identity:\n Account ID: {}\n User ID: {}\n ARN: {}",
                identity.account_id, identity.user_id, identity.user_arn
            ),
        });
    }

    if let Some(errors) = collect_errors(&doc) {
        let message = errors.values().cloned().collect::<Vec<_>>().join("\n");
        return Ok(TestOutcome {
            success: false,
            message,
        });
    }

    Ok(TestOutcome {
        success: true,
        message: format!(
            "{TEST_CONNECTION_PREFIX}Could not get the Caller Identity information from the response."
        ),
    })
}
