//! # Remote Data Sources
//!
//! Supporting option lists fetched from the admin server. All four sources
//! follow the same shape: a loading flag, an error message, the data, and
//! an explicit reload. Nothing retries automatically; a failed source stays
//! failed until the user triggers a reload (reopening a selector reloads
//! available connections, for instance).
//!
//! Reloads may overlap: every request is stamped with a monotonically
//! increasing generation and a completion is discarded when a newer request
//! was issued in the meantime, so the displayed state always belongs to the
//! latest reload rather than the slowest one.

use std::collections::BTreeMap;
use std::fmt;
use std::sync::{Arc, Mutex};

use tracing::{debug, warn};

use crate::config::ConnectionConfig;
use crate::constants::{GENERATE_ID_OBJECT, GENERATE_ID_PATH};
use crate::fields::OptionItem;
use crate::host::{RequestParams, Transport};

/// State machine shared by every source: generation-guarded
/// loading / error / data.
#[derive(Debug)]
pub struct RemoteData<T> {
    issued: u64,
    loading: bool,
    error: Option<String>,
    data: Option<T>,
}

impl<T> Default for RemoteData<T> {
    fn default() -> Self {
        Self {
            issued: 0,
            loading: false,
            error: None,
            data: None,
        }
    }
}

impl<T> RemoteData<T> {
    /// Register a new request. Returns its generation stamp.
    pub fn begin(&mut self) -> u64 {
        self.issued += 1;
        self.loading = true;
        self.error = None;
        self.issued
    }

    /// Apply a completed request. A completion whose generation is not the
    /// latest issued one is stale and is discarded; returns whether the
    /// result was applied.
    pub fn complete(&mut self, generation: u64, result: Result<T, String>) -> bool {
        if generation != self.issued {
            debug!(generation, latest = self.issued, "discarding stale response");
            return false;
        }

        self.loading = false;
        match result {
            Ok(data) => {
                self.data = Some(data);
                self.error = None;
            }
            Err(message) => self.error = Some(message),
        }
        true
    }

    pub fn is_loading(&self) -> bool {
        self.loading
    }

    pub fn error(&self) -> Option<&str> {
        self.error.as_deref()
    }

    pub fn data(&self) -> Option<&T> {
        self.data.as_ref()
    }
}

/// Point-in-time copy of a source's state, for hosts that render.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RemoteSnapshot<T> {
    pub loading: bool,
    pub error: Option<String>,
    pub data: Option<T>,
}

fn snapshot_of<T: Clone>(state: &Mutex<RemoteData<T>>) -> RemoteSnapshot<T> {
    let guard = state.lock().expect("remote state lock poisoned");
    RemoteSnapshot {
        loading: guard.loading,
        error: guard.error.clone(),
        data: guard.data.clone(),
    }
}

/// Supported provider types for the project: a key→label JSON object
/// turned into an option list. Feeds the provider-type selector shown in
/// the default display mode.
pub struct SupportedProvidersSource {
    transport: Arc<dyn Transport>,
    url: String,
    project_id: String,
    state: Mutex<RemoteData<Vec<OptionItem>>>,
}

impl fmt::Debug for SupportedProvidersSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SupportedProvidersSource")
            .field("url", &self.url)
            .field("project_id", &self.project_id)
            .finish_non_exhaustive()
    }
}

impl SupportedProvidersSource {
    pub fn new(transport: Arc<dyn Transport>, config: &ConnectionConfig) -> Self {
        Self {
            transport,
            url: config.supported_providers_url.clone(),
            project_id: config.project_id.clone(),
            state: Mutex::new(RemoteData::default()),
        }
    }

    pub async fn reload(&self) -> bool {
        let generation = self.state.lock().expect("remote state lock poisoned").begin();

        let url = format!("{}?projectId={}", self.url, self.project_id);
        let result = match self.transport.get(&url).await {
            Ok(body) => serde_json::from_str::<BTreeMap<String, String>>(&body)
                .map(|providers| {
                    providers
                        .into_iter()
                        .map(|(key, label)| OptionItem::new(key, label))
                        .collect()
                })
                .map_err(|err| err.to_string()),
            Err(err) => Err(err.to_string()),
        };

        if let Err(message) = &result {
            warn!(%message, "supported providers fetch failed");
        }

        self.state
            .lock()
            .expect("remote state lock poisoned")
            .complete(generation, result)
    }

    /// The provider entry for a key, if the source already loaded.
    pub fn provider(&self, key: &str) -> Option<OptionItem> {
        let guard = self.state.lock().expect("remote state lock poisoned");
        guard
            .data()
            .and_then(|options| options.iter().find(|option| option.key == key).cloned())
    }

    pub fn snapshot(&self) -> RemoteSnapshot<Vec<OptionItem>> {
        snapshot_of(&self.state)
    }
}

/// Type-tag predicate for filtering selectable upstream connections.
pub type ConnectionTypeFilter = Box<dyn Fn(&str) -> bool + Send + Sync>;

/// Access-keys connections available as IAM-role upstreams. The server
/// answers with `[key, label, _, typeTag]` rows; rows may be filtered by a
/// caller predicate over the type tag.
pub struct AvailableConnectionsSource {
    transport: Arc<dyn Transport>,
    url: String,
    project_id: String,
    resource: String,
    type_filter: Option<ConnectionTypeFilter>,
    state: Mutex<RemoteData<Vec<OptionItem>>>,
}

impl fmt::Debug for AvailableConnectionsSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AvailableConnectionsSource")
            .field("url", &self.url)
            .field("project_id", &self.project_id)
            .field("resource", &self.resource)
            .finish_non_exhaustive()
    }
}

impl AvailableConnectionsSource {
    pub fn new(transport: Arc<dyn Transport>, config: &ConnectionConfig) -> Self {
        Self {
            transport,
            url: config.available_aws_connections_controller_url.clone(),
            project_id: config.project_id.clone(),
            resource: config.available_aws_connections_controller_resource.clone(),
            type_filter: None,
            state: Mutex::new(RemoteData::default()),
        }
    }

    pub fn with_type_filter(mut self, filter: ConnectionTypeFilter) -> Self {
        self.type_filter = Some(filter);
        self
    }

    pub async fn reload(&self) -> bool {
        let generation = self.state.lock().expect("remote state lock poisoned").begin();

        let url = format!(
            "{}?projectId={}&resource={}",
            self.url, self.project_id, self.resource
        );
        let result = match self.transport.post_form(&url, &RequestParams::new()).await {
            Ok(body) => serde_json::from_str::<Vec<Vec<String>>>(&body)
                .map(|rows| self.options_from_rows(rows))
                .map_err(|err| err.to_string()),
            Err(err) => Err(err.to_string()),
        };

        if let Err(message) = &result {
            warn!(%message, "available connections fetch failed");
        }

        self.state
            .lock()
            .expect("remote state lock poisoned")
            .complete(generation, result)
    }

    fn options_from_rows(&self, rows: Vec<Vec<String>>) -> Vec<OptionItem> {
        rows.into_iter()
            .filter(|row| {
                let type_tag = row.get(3).map(String::as_str).unwrap_or_default();
                self.type_filter
                    .as_ref()
                    .is_none_or(|filter| filter(type_tag))
            })
            .filter_map(|row| {
                let key = row.first()?;
                let label = row.get(1)?;
                Some(OptionItem::new(key, label))
            })
            .collect()
    }

    pub fn snapshot(&self) -> RemoteSnapshot<Vec<OptionItem>> {
        snapshot_of(&self.state)
    }
}

/// Connection-id candidate derived from the display name. Fired on every
/// display-name change in create mode; the generation guard makes the
/// latest response win.
pub struct GeneratedIdSource {
    transport: Arc<dyn Transport>,
    project_id: String,
    state: Mutex<RemoteData<String>>,
}

impl fmt::Debug for GeneratedIdSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("GeneratedIdSource")
            .field("project_id", &self.project_id)
            .finish_non_exhaustive()
    }
}

impl GeneratedIdSource {
    pub fn new(transport: Arc<dyn Transport>, config: &ConnectionConfig) -> Self {
        Self {
            transport,
            project_id: config.project_id.clone(),
            state: Mutex::new(RemoteData::default()),
        }
    }

    /// Request an id for `display_name`. `Ok(None)` means a newer request
    /// was issued before this one completed and its result was discarded.
    pub async fn generate(
        &self,
        display_name: &str,
    ) -> Result<Option<String>, crate::host::TransportError> {
        let generation = self.state.lock().expect("remote state lock poisoned").begin();

        let mut params = RequestParams::new();
        params.insert(
            "object".to_string(),
            Some(GENERATE_ID_OBJECT.to_string()),
        );
        params.insert("name".to_string(), Some(display_name.to_string()));
        params.insert("parentId".to_string(), Some(self.project_id.clone()));

        match self.transport.post_form(GENERATE_ID_PATH, &params).await {
            Ok(body) => {
                let id = body.trim().to_string();
                let applied = self
                    .state
                    .lock()
                    .expect("remote state lock poisoned")
                    .complete(generation, Ok(id.clone()));
                Ok(applied.then_some(id))
            }
            Err(err) => {
                self.state
                    .lock()
                    .expect("remote state lock poisoned")
                    .complete(generation, Err(err.to_string()));
                Err(err)
            }
        }
    }

    pub fn snapshot(&self) -> RemoteSnapshot<String> {
        snapshot_of(&self.state)
    }
}

/// External id to place in the IAM role's trust-policy condition.
/// Display-only, with a clipboard-copy affordance on the host side.
pub struct ExternalIdSource {
    transport: Arc<dyn Transport>,
    url: String,
    project_id: String,
    connection_param: String,
    connection_id: String,
    state: Mutex<RemoteData<String>>,
}

impl fmt::Debug for ExternalIdSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ExternalIdSource")
            .field("url", &self.url)
            .field("connection_id", &self.connection_id)
            .finish_non_exhaustive()
    }
}

impl ExternalIdSource {
    pub fn new(transport: Arc<dyn Transport>, config: &ConnectionConfig) -> Self {
        Self {
            transport,
            url: config.external_ids_controller_url.clone(),
            project_id: config.project_id.clone(),
            connection_param: config.external_ids_connection_param.clone(),
            connection_id: config.connection_id.clone(),
            state: Mutex::new(RemoteData::default()),
        }
    }

    pub async fn reload(&self) -> bool {
        let generation = self.state.lock().expect("remote state lock poisoned").begin();

        let url = format!(
            "{}?projectId={}&{}={}",
            self.url, self.project_id, self.connection_param, self.connection_id
        );
        let result = match self.transport.post_form(&url, &RequestParams::new()).await {
            Ok(body) => serde_json::from_str::<String>(&body).map_err(|err| err.to_string()),
            Err(err) => Err(err.to_string()),
        };

        if let Err(message) = &result {
            warn!(%message, "external id fetch failed");
        }

        self.state
            .lock()
            .expect("remote state lock poisoned")
            .complete(generation, result)
    }

    pub fn snapshot(&self) -> RemoteSnapshot<String> {
        snapshot_of(&self.state)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_begin_sets_loading_and_clears_error() {
        let mut state: RemoteData<u32> = RemoteData::default();
        state.begin();
        let generation = state.issued;
        state.complete(generation, Err("boom".to_string()));
        assert_eq!(state.error(), Some("boom"));

        state.begin();
        assert!(state.is_loading());
        assert_eq!(state.error(), None);
    }

    #[test]
    fn test_latest_issued_generation_wins() {
        let mut state: RemoteData<&str> = RemoteData::default();
        let first = state.begin();
        let second = state.begin();

        // The slow first request lands after the second was issued.
        assert!(!state.complete(first, Ok("stale")));
        assert!(state.is_loading());
        assert_eq!(state.data(), None);

        assert!(state.complete(second, Ok("fresh")));
        assert!(!state.is_loading());
        assert_eq!(state.data(), Some(&"fresh"));
    }

    #[test]
    fn test_failure_keeps_previous_data() {
        let mut state: RemoteData<&str> = RemoteData::default();
        let generation = state.begin();
        state.complete(generation, Ok("loaded"));

        let generation = state.begin();
        state.complete(generation, Err("offline".to_string()));

        // The stale list is still displayed alongside the error.
        assert_eq!(state.data(), Some(&"loaded"));
        assert_eq!(state.error(), Some("offline"));
    }
}
