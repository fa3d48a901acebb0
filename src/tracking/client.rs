//! REST client for an MLflow-compatible tracking server.

use base64::Engine as _;
use serde_json::{Value, json};
use thiserror::Error;

use super::TrackingConfig;
use crate::http_client;

const MAX_RESPONSE_BYTES: usize = 256 * 1024;

/// Errors that may occur while talking to the tracking server.
#[derive(Debug, Error)]
pub enum TrackingError {
    /// The configured tracking URI did not parse.
    #[error("Invalid tracking URI {raw:?}: {source}")]
    InvalidUri {
        /// Raw value from the environment.
        raw: String,
        /// Underlying parse error.
        source: url::ParseError,
    },
    /// The server rejected the configured credentials.
    #[error("Tracking server rejected credentials")]
    Unauthorized,
    /// The server answered with a non-success status.
    #[error("Tracking server error (HTTP {code}): {body}")]
    Server {
        /// HTTP status code.
        code: u16,
        /// Response body, bounded.
        body: String,
    },
    /// The request never produced an HTTP response.
    #[error("Tracking request failed: {0}")]
    Transport(String),
    /// The server answered with something the client cannot interpret.
    #[error("Unexpected tracking response: {0}")]
    Protocol(String),
}

/// Thin client over the tracking server's run endpoints.
pub struct TrackingClient {
    config: TrackingConfig,
}

impl TrackingClient {
    pub fn new(config: TrackingConfig) -> Self {
        Self { config }
    }

    /// Create a run and return its server-assigned id.
    pub(crate) fn create_run(
        &self,
        experiment_id: &str,
        run_name: &str,
        start_time_ms: i64,
    ) -> Result<String, TrackingError> {
        let body = self.post(
            "runs/create",
            &json!({
                "experiment_id": experiment_id,
                "run_name": run_name,
                "start_time": start_time_ms,
            }),
        )?;
        let value: Value = serde_json::from_str(&body)
            .map_err(|err| TrackingError::Protocol(err.to_string()))?;
        value["run"]["info"]["run_id"]
            .as_str()
            .map(|run_id| run_id.to_string())
            .ok_or_else(|| TrackingError::Protocol("Response carries no run id".to_string()))
    }

    pub(crate) fn log_param(
        &self,
        run_id: &str,
        key: &str,
        value: &str,
    ) -> Result<(), TrackingError> {
        self.post(
            "runs/log-parameter",
            &json!({ "run_id": run_id, "key": key, "value": value }),
        )
        .map(|_| ())
    }

    pub(crate) fn log_metric(
        &self,
        run_id: &str,
        key: &str,
        value: f64,
        timestamp_ms: i64,
    ) -> Result<(), TrackingError> {
        self.post(
            "runs/log-metric",
            &json!({
                "run_id": run_id,
                "key": key,
                "value": value,
                "timestamp": timestamp_ms,
            }),
        )
        .map(|_| ())
    }

    pub(crate) fn set_tag(
        &self,
        run_id: &str,
        key: &str,
        value: &str,
    ) -> Result<(), TrackingError> {
        self.post(
            "runs/set-tag",
            &json!({ "run_id": run_id, "key": key, "value": value }),
        )
        .map(|_| ())
    }

    /// Terminate a run with a final status.
    pub(crate) fn update_run(
        &self,
        run_id: &str,
        status: &str,
        end_time_ms: i64,
    ) -> Result<(), TrackingError> {
        self.post(
            "runs/update",
            &json!({ "run_id": run_id, "status": status, "end_time": end_time_ms }),
        )
        .map(|_| ())
    }

    fn endpoint_url(&self, endpoint: &str) -> String {
        let base = self.config.uri.as_str().trim_end_matches('/');
        format!("{base}/api/2.0/mlflow/{endpoint}")
    }

    fn post(&self, endpoint: &str, payload: &Value) -> Result<String, TrackingError> {
        let url = self.endpoint_url(endpoint);
        http_client::retry_with_backoff(
            http_client::RetryConfig::default(),
            || self.post_once(&url, payload),
            |err| {
                matches!(err, TrackingError::Transport(_))
                    || matches!(err, TrackingError::Server { code, .. } if *code >= 500)
            },
        )
    }

    fn post_once(&self, url: &str, payload: &Value) -> Result<String, TrackingError> {
        let mut request = http_client::agent()
            .post(url)
            .set("Accept", "application/json")
            .set("Content-Type", "application/json");
        if let Some(header) = self.auth_header() {
            request = request.set("Authorization", &header);
        }
        match request.send_json(payload) {
            Ok(response) => http_client::read_body_limited(response, MAX_RESPONSE_BYTES)
                .map_err(|err| TrackingError::Protocol(err.to_string())),
            Err(ureq::Error::Status(code, response)) => {
                let body = http_client::read_body_limited(response, MAX_RESPONSE_BYTES)
                    .unwrap_or_else(|err| err.to_string());
                Err(match code {
                    401 | 403 => TrackingError::Unauthorized,
                    _ => TrackingError::Server { code, body },
                })
            }
            Err(ureq::Error::Transport(err)) => Err(TrackingError::Transport(err.to_string())),
        }
    }

    fn auth_header(&self) -> Option<String> {
        let username = self.config.username.as_deref()?;
        let password = self.config.password.as_deref().unwrap_or("");
        let token = base64::engine::general_purpose::STANDARD
            .encode(format!("{username}:{password}"));
        Some(format!("Basic {token}"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::{Read, Write};
    use std::net::TcpListener;
    use std::thread;

    fn config(uri: &str, username: Option<&str>) -> TrackingConfig {
        TrackingConfig {
            uri: url::Url::parse(uri).unwrap(),
            username: username.map(|name| name.to_string()),
            password: username.map(|_| "pw".to_string()),
        }
    }

    fn serve_once(response: String) -> (String, thread::JoinHandle<String>) {
        let listener = TcpListener::bind("127.0.0.1:0").unwrap();
        let addr = listener.local_addr().unwrap();
        let handle = thread::spawn(move || {
            let mut request = String::new();
            if let Ok((mut stream, _)) = listener.accept() {
                let mut buf = [0u8; 4096];
                if let Ok(read) = stream.read(&mut buf) {
                    request = String::from_utf8_lossy(&buf[..read]).to_string();
                }
                let _ = stream.write_all(response.as_bytes());
            }
            request
        });
        (format!("http://{}", addr), handle)
    }

    fn ok_response(body: &str) -> String {
        format!(
            "HTTP/1.1 200 OK\r\nContent-Type: application/json\r\nContent-Length: {}\r\n\r\n{}",
            body.len(),
            body
        )
    }

    #[test]
    fn endpoint_url_joins_base_and_path() {
        let client = TrackingClient::new(config("https://tracker.example/mlflow/", None));
        assert_eq!(
            client.endpoint_url("runs/create"),
            "https://tracker.example/mlflow/api/2.0/mlflow/runs/create"
        );
    }

    #[test]
    fn auth_header_is_basic_base64() {
        let client = TrackingClient::new(config("https://tracker.example", Some("alice")));
        let header = client.auth_header().unwrap();
        assert_eq!(header, "Basic YWxpY2U6cHc=");
        let anonymous = TrackingClient::new(config("https://tracker.example", None));
        assert!(anonymous.auth_header().is_none());
    }

    #[test]
    fn create_run_extracts_the_run_id() {
        let body = r#"{"run":{"info":{"run_id":"abc123"}}}"#;
        let (uri, handle) = serve_once(ok_response(body));
        let client = TrackingClient::new(config(&uri, Some("alice")));
        let run_id = client.create_run("0", "train", 1_700_000_000_000).unwrap();
        assert_eq!(run_id, "abc123");
        let request = handle.join().unwrap();
        assert!(request.starts_with("POST /api/2.0/mlflow/runs/create"));
        assert!(request.contains("Authorization: Basic"));
    }

    #[test]
    fn create_run_without_run_id_is_a_protocol_error() {
        let (uri, _handle) = serve_once(ok_response(r#"{"run":{}}"#));
        let client = TrackingClient::new(config(&uri, None));
        let err = client.create_run("0", "train", 0).unwrap_err();
        assert!(matches!(err, TrackingError::Protocol(_)));
    }

    #[test]
    fn unauthorized_status_maps_to_unauthorized() {
        let response =
            "HTTP/1.1 401 Unauthorized\r\nContent-Length: 0\r\n\r\n".to_string();
        let (uri, _handle) = serve_once(response);
        let client = TrackingClient::new(config(&uri, Some("alice")));
        let err = client.log_metric("abc", "accuracy", 0.9, 0).unwrap_err();
        assert!(matches!(err, TrackingError::Unauthorized));
    }
}
