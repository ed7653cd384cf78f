//! Shared test support: a scripted in-memory transport standing in for the
//! admin server, plus a tagging encryptor.

use std::sync::Mutex;

use async_trait::async_trait;

use aws_connection_manager::host::{
    EncryptError, RequestParams, SecretEncryptor, Transport, TransportError,
};

/// A recorded request as the mock saw it.
#[derive(Debug, Clone)]
pub struct RecordedRequest {
    pub method: &'static str,
    pub url: String,
    pub params: RequestParams,
    pub json: Option<serde_json::Value>,
}

enum Scripted {
    Body(String),
    Status(u16),
}

/// Scripted transport: responses are matched by URL substring, in
/// registration order; every request is recorded for assertions.
pub struct MockTransport {
    scripts: Mutex<Vec<(String, Scripted)>>,
    requests: Mutex<Vec<RecordedRequest>>,
}

impl MockTransport {
    pub fn new() -> Self {
        Self {
            scripts: Mutex::new(Vec::new()),
            requests: Mutex::new(Vec::new()),
        }
    }

    pub fn respond(self, url_part: &str, body: &str) -> Self {
        self.scripts
            .lock()
            .expect("scripts lock")
            .push((url_part.to_string(), Scripted::Body(body.to_string())));
        self
    }

    pub fn fail(self, url_part: &str, status: u16) -> Self {
        self.scripts
            .lock()
            .expect("scripts lock")
            .push((url_part.to_string(), Scripted::Status(status)));
        self
    }

    pub fn requests(&self) -> Vec<RecordedRequest> {
        self.requests.lock().expect("requests lock").clone()
    }

    /// The single recorded request hitting `url_part`.
    pub fn request_to(&self, url_part: &str) -> RecordedRequest {
        let matching: Vec<RecordedRequest> = self
            .requests()
            .into_iter()
            .filter(|request| request.url.contains(url_part))
            .collect();
        assert_eq!(
            matching.len(),
            1,
            "expected exactly one request to {url_part}"
        );
        matching.into_iter().next().expect("one request")
    }

    fn answer(&self, request: RecordedRequest) -> Result<String, TransportError> {
        let url = request.url.clone();
        self.requests.lock().expect("requests lock").push(request);

        let scripts = self.scripts.lock().expect("scripts lock");
        match scripts.iter().find(|(part, _)| url.contains(part)) {
            Some((_, Scripted::Body(body))) => Ok(body.clone()),
            Some((_, Scripted::Status(status))) => Err(TransportError::Status {
                url,
                status: *status,
            }),
            None => Err(TransportError::Status { url, status: 404 }),
        }
    }
}

#[async_trait]
impl Transport for MockTransport {
    async fn get(&self, url: &str) -> Result<String, TransportError> {
        self.answer(RecordedRequest {
            method: "GET",
            url: url.to_string(),
            params: RequestParams::new(),
            json: None,
        })
    }

    async fn post_form(
        &self,
        url: &str,
        params: &RequestParams,
    ) -> Result<String, TransportError> {
        self.answer(RecordedRequest {
            method: "POST",
            url: url.to_string(),
            params: params.clone(),
            json: None,
        })
    }

    async fn post_json(
        &self,
        url: &str,
        body: &serde_json::Value,
    ) -> Result<String, TransportError> {
        self.answer(RecordedRequest {
            method: "POST",
            url: url.to_string(),
            params: RequestParams::new(),
            json: Some(body.clone()),
        })
    }
}

/// Deterministic stand-in for the host's public-key encryption.
pub struct TaggingEncryptor;

impl SecretEncryptor for TaggingEncryptor {
    fn encrypt(&self, plaintext: &str, public_key: &str) -> Result<String, EncryptError> {
        Ok(format!("enc[{public_key}]:{plaintext}"))
    }
}
