//! # Connection Page Scraper
//!
//! Existing connections are loaded from the server-rendered connection
//! page, which embeds the record as script literals:
//!
//! ```text
//! const config = { projectId: '_Root', sessionCredentialsEnabled: 'true' === 'true', ... };
//! const allRegions = { allRegionKeys: '...', allRegionValues: '...' };
//! ```
//!
//! This is a versioned contract with the server's template output, not real
//! JSON: keys are bare, strings are single-quoted, trailing commas appear,
//! and boolean flags are rendered as `'<value>' === 'true'` comparisons.
//! The scraper locates the literals by pattern, normalizes them into strict
//! JSON, and deserializes a [`ConnectionConfig`]. Every malformed input
//! path returns a structured error; nothing here panics on server output.

use std::sync::LazyLock;

use regex::Regex;
use thiserror::Error;
use tracing::{debug, warn};

use crate::config::ConnectionConfig;
use crate::host::{RequestParams, Transport, TransportError};

#[derive(Debug, Error)]
pub enum ScrapeError {
    #[error("connection page does not embed a `{literal}` literal")]
    MissingLiteral { literal: &'static str },

    #[error("embedded `{literal}` literal did not normalize to valid JSON: {source}")]
    Malformed {
        literal: &'static str,
        #[source]
        source: serde_json::Error,
    },
}

/// Loading an existing connection: transport and scraping failures both
/// surface as a "could not load" condition to the user.
#[derive(Debug, Error)]
pub enum LoadError {
    #[error(transparent)]
    Transport(#[from] TransportError),

    #[error(transparent)]
    Scrape(#[from] ScrapeError),
}

static BOOL_COMPARISON: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r#"['"]([^'"]*)['"]\s*===\s*['"]true['"]"#).expect("valid pattern")
});

static SINGLE_QUOTED: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"'((?:[^'\\]|\\.)*)'").expect("valid pattern"));

static BARE_KEY: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"([{,]\s*)([A-Za-z_$][A-Za-z0-9_$]*)\s*:").expect("valid pattern")
});

static TRAILING_COMMA: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r",\s*([}\]])").expect("valid pattern"));

/// Locate `const <name> = { ... }` and return the brace-balanced object
/// span. Balancing respects string literals so embedded braces do not
/// terminate the scan early.
fn extract_object_literal<'a>(html: &'a str, name: &str) -> Option<&'a str> {
    let declaration =
        Regex::new(&format!(r"const\s+{}\s*=\s*\{{", regex::escape(name))).ok()?;
    let found = declaration.find(html)?;
    let open = found.end() - 1;

    let mut depth = 0usize;
    let mut in_string: Option<char> = None;
    let mut escaped = false;

    for (offset, ch) in html[open..].char_indices() {
        if let Some(quote) = in_string {
            if escaped {
                escaped = false;
            } else if ch == '\\' {
                escaped = true;
            } else if ch == quote {
                in_string = None;
            }
            continue;
        }

        match ch {
            '\'' | '"' => in_string = Some(ch),
            '{' => depth += 1,
            '}' => {
                depth -= 1;
                if depth == 0 {
                    return Some(&html[open..=open + offset]);
                }
            }
            _ => {}
        }
    }

    None
}

/// Rewrite the relaxed object literal into strict JSON.
fn normalize_relaxed_json(literal: &str) -> String {
    // Boolean-string comparison artifacts first, while quoting is intact.
    let normalized = BOOL_COMPARISON.replace_all(literal, |caps: &regex::Captures<'_>| {
        if &caps[1] == "true" { "true" } else { "false" }.to_string()
    });

    let normalized = SINGLE_QUOTED.replace_all(&normalized, |caps: &regex::Captures<'_>| {
        let inner = caps[1].replace("\\'", "'").replace('"', "\\\"");
        format!("\"{inner}\"")
    });

    let normalized = BARE_KEY.replace_all(&normalized, "$1\"$2\":");

    TRAILING_COMMA.replace_all(&normalized, "$1").into_owned()
}

fn parse_literal(html: &str, name: &'static str) -> Result<serde_json::Value, ScrapeError> {
    let literal =
        extract_object_literal(html, name).ok_or(ScrapeError::MissingLiteral { literal: name })?;

    let normalized = normalize_relaxed_json(literal);
    serde_json::from_str(&normalized).map_err(|source| ScrapeError::Malformed {
        literal: name,
        source,
    })
}

/// Reconstruct a [`ConnectionConfig`] from a rendered connection page.
///
/// `allRegions` is rendered as a sibling literal; when present it is folded
/// into the config before deserialization.
pub fn scrape_connection_page(html: &str) -> Result<ConnectionConfig, ScrapeError> {
    let mut config_value = parse_literal(html, "config")?;

    match parse_literal(html, "allRegions") {
        Ok(regions) => {
            if let Some(object) = config_value.as_object_mut() {
                object.insert("allRegions".to_string(), regions);
            }
        }
        Err(ScrapeError::MissingLiteral { .. }) => {
            debug!("connection page carries no allRegions literal");
        }
        Err(err) => return Err(err),
    }

    serde_json::from_value(config_value).map_err(|source| ScrapeError::Malformed {
        literal: "config",
        source,
    })
}

/// Fetch and scrape the connection page for one connection.
pub async fn fetch_connection_config(
    transport: &dyn Transport,
    page_url: &str,
    project_id: &str,
    connection_id: &str,
) -> Result<ConnectionConfig, LoadError> {
    let mut params = RequestParams::new();
    params.insert("projectId".to_string(), Some(project_id.to_string()));
    params.insert("connectionId".to_string(), Some(connection_id.to_string()));

    let page = transport.post_form(page_url, &params).await?;

    let config = scrape_connection_page(&page).inspect_err(|err| {
        warn!(connection_id, %err, "could not reconstruct connection from page");
    })?;

    Ok(config)
}

#[cfg(test)]
mod tests {
    use super::*;

    const PAGE: &str = r#"
        <div id="edit-aws-connection-root"></div>
        <script type="text/javascript">
          const config = {
            projectId: '_Root',
            connectionId: 'awsConnection:prod',
            displayName: 'Prod deployer\'s connection',
            credentialsType: 'awsAccessKeys',
            accessKeyId: 'AKIA42',
            secretAccessKey: 'AES:v1:abcdef==',
            sessionCredentialsEnabled: 'true',
            isDefaultCredProviderEnabled: 'false' === 'true',
            buildStepsFeatureEnabled: 'true' === 'true',
            publicKey: 'MIIBIjAN',
          };
          const allRegions = {
            allRegionKeys: 'us-east-1,cn-north-1',
            allRegionValues: 'US East,China (Beijing)',
          };
        </script>
    "#;

    #[test]
    fn test_scrapes_full_page() {
        let config = scrape_connection_page(PAGE).expect("scrapes");

        assert_eq!(config.project_id, "_Root");
        assert_eq!(config.connection_id, "awsConnection:prod");
        assert_eq!(config.display_name, "Prod deployer's connection");
        assert_eq!(config.access_key_id, "AKIA42");
        assert_eq!(config.session_credentials_enabled, "true");
        assert!(!config.is_default_cred_provider_enabled);
        assert!(config.build_steps_feature_enabled);
        assert_eq!(config.all_regions.all_region_keys, "us-east-1,cn-north-1");
    }

    #[test]
    fn test_missing_config_literal() {
        let err = scrape_connection_page("<html><body>login required</body></html>")
            .expect_err("no literal");
        assert!(matches!(
            err,
            ScrapeError::MissingLiteral { literal: "config" }
        ));
    }

    #[test]
    fn test_missing_regions_literal_is_tolerated() {
        let page = "const config = { projectId: '_Root' };";
        let config = scrape_connection_page(page).expect("scrapes");
        assert_eq!(config.project_id, "_Root");
        assert!(config.all_regions.all_region_keys.is_empty());
    }

    #[test]
    fn test_malformed_literal_is_an_error_not_a_panic() {
        let page = "const config = { projectId: , };";
        assert!(matches!(
            scrape_connection_page(page),
            Err(ScrapeError::Malformed { .. })
        ));
    }

    #[test]
    fn test_comparison_artifact_both_ways() {
        let page = r"const config = {
            buildStepsFeatureEnabled: 'true' === 'true',
            subProjectsFeatureEnabled: 'false' === 'true'
        };";

        let config = scrape_connection_page(page).expect("scrapes");
        assert!(config.build_steps_feature_enabled);
        assert!(!config.sub_projects_feature_enabled);
    }

    #[test]
    fn test_brace_balancing_ignores_braces_in_strings() {
        let page = "const config = { projectId: '_Root', displayName: 'curly } brace' };";
        let config = scrape_connection_page(page).expect("scrapes");
        assert_eq!(config.display_name, "curly } brace");
    }
}
