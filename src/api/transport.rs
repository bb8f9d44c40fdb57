//! HTTP transport used by [`ApiClient`](super::ApiClient).
//!
//! The transport only moves bytes: it never raises on a non-2xx status. The
//! caller inspects [`HttpResponse::status`] and decides whether the response
//! is fatal, retryable or fine. Only connection-level failures become
//! [`CvatError::Transport`].

use std::fmt;
use std::io::Read;

use serde::Deserialize;

use crate::config::{ClientConfig, Credentials};
use crate::error::CvatError;

/// Upper bound for buffered (non-streamed) response bodies.
const MAX_BUFFERED_BODY: u64 = 256 * 1024 * 1024;

/// A fully buffered response.
#[derive(Clone, Debug)]
pub struct HttpResponse {
    pub status: u16,
    pub body: Vec<u8>,
}

impl HttpResponse {
    /// Returns true for 2xx statuses.
    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }

    /// The body as (lossy) UTF-8, for error messages.
    pub fn body_text(&self) -> String {
        String::from_utf8_lossy(&self.body).into_owned()
    }
}

/// A response whose body is read incrementally.
pub struct StreamResponse {
    pub status: u16,
    pub content_length: Option<u64>,
    pub reader: Box<dyn Read>,
}

impl fmt::Debug for StreamResponse {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("StreamResponse")
            .field("status", &self.status)
            .field("content_length", &self.content_length)
            .finish_non_exhaustive()
    }
}

/// Minimal GET-only transport contract.
pub trait Transport: Send + Sync {
    /// Issue a GET request and buffer the whole body.
    fn get(&self, url: &str, params: &[(&str, &str)]) -> Result<HttpResponse, CvatError>;

    /// Issue a GET request and hand back a reader over the body.
    fn get_stream(&self, url: &str, params: &[(&str, &str)])
        -> Result<StreamResponse, CvatError>;
}

/// [`Transport`] backed by a `ureq` agent with token authentication.
pub struct HttpTransport {
    agent: ureq::Agent,
    authorization: String,
}

#[derive(Deserialize)]
struct LoginResponse {
    key: String,
}

impl HttpTransport {
    /// Build a transport for `config`, logging in first when only a username
    /// and password are configured.
    pub fn connect(config: &ClientConfig) -> Result<Self, CvatError> {
        let agent_config = ureq::Agent::config_builder()
            .timeout_global(Some(config.timeout))
            .http_status_as_error(false)
            .build();
        let agent: ureq::Agent = agent_config.into();

        let token = match &config.credentials {
            Credentials::Token(token) => token.clone(),
            Credentials::Login { username, password } => {
                login(&agent, &config.endpoint("api/auth/login")?, username, password)?
            }
        };

        Ok(Self {
            agent,
            authorization: format!("Token {token}"),
        })
    }
}

fn login(
    agent: &ureq::Agent,
    url: &str,
    username: &str,
    password: &str,
) -> Result<String, CvatError> {
    log::debug!("Logging in as '{username}'");
    let mut response = agent
        .post(url)
        .send_json(serde_json::json!({
            "username": username,
            "password": password,
        }))
        .map_err(|source| CvatError::Transport {
            url: url.to_string(),
            message: source.to_string(),
        })?;

    let status = response.status().as_u16();
    if !(200..300).contains(&status) {
        let body = response
            .body_mut()
            .read_to_string()
            .unwrap_or_default();
        return Err(CvatError::HttpStatus {
            url: url.to_string(),
            status,
            body,
        });
    }

    let login: LoginResponse =
        response
            .body_mut()
            .read_json()
            .map_err(|source| CvatError::Transport {
                url: url.to_string(),
                message: format!("unreadable login response: {source}"),
            })?;
    Ok(login.key)
}

impl HttpTransport {
    fn request(
        &self,
        url: &str,
        params: &[(&str, &str)],
    ) -> Result<ureq::http::Response<ureq::Body>, CvatError> {
        let mut request = self
            .agent
            .get(url)
            .header("Authorization", self.authorization.as_str());
        for (key, value) in params {
            request = request.query(*key, *value);
        }

        let response = request.call().map_err(|source| CvatError::Transport {
            url: url.to_string(),
            message: source.to_string(),
        })?;
        log::debug!(
            "GET {url} {params:?} -> {}",
            response.status().as_u16()
        );
        Ok(response)
    }
}

impl Transport for HttpTransport {
    fn get(&self, url: &str, params: &[(&str, &str)]) -> Result<HttpResponse, CvatError> {
        let mut response = self.request(url, params)?;
        let status = response.status().as_u16();
        let body = response
            .body_mut()
            .with_config()
            .limit(MAX_BUFFERED_BODY)
            .read_to_vec()
            .map_err(|source| CvatError::Transport {
                url: url.to_string(),
                message: format!("failed reading body: {source}"),
            })?;
        Ok(HttpResponse { status, body })
    }

    fn get_stream(
        &self,
        url: &str,
        params: &[(&str, &str)],
    ) -> Result<StreamResponse, CvatError> {
        let response = self.request(url, params)?;
        let status = response.status().as_u16();
        let content_length = response
            .headers()
            .get("content-length")
            .and_then(|value| value.to_str().ok())
            .and_then(|value| value.trim().parse::<u64>().ok());
        let reader = response.into_body().into_reader();
        Ok(StreamResponse {
            status,
            content_length,
            reader: Box::new(reader),
        })
    }
}
