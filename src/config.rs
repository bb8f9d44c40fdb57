//! Client configuration.
//!
//! Configuration is an explicit value handed to the transport at
//! construction. It is read from the environment, optionally seeded from a
//! `.env` file in the working directory.
//!
//! | Env Var             | Default               |
//! |---------------------|-----------------------|
//! | `CVAT_HOST`         | `https://app.cvat.ai` |
//! | `CVAT_TOKEN`        | none                  |
//! | `CVAT_USERNAME`     | none                  |
//! | `CVAT_PASSWORD`     | none                  |
//! | `CVAT_TIMEOUT_SECS` | `60`                  |
//! | `CVAT_PAGE_SIZE`    | `100`                 |

use std::fmt;
use std::time::Duration;

use url::Url;

use crate::error::CvatError;

pub const DEFAULT_HOST: &str = "https://app.cvat.ai";
pub const DEFAULT_TIMEOUT_SECS: u64 = 60;
pub const DEFAULT_PAGE_SIZE: u32 = 100;

/// How the client authenticates.
#[derive(Clone, PartialEq, Eq)]
pub enum Credentials {
    /// A personal access token, sent as `Authorization: Token <key>`.
    Token(String),
    /// Username and password, exchanged for a token on connect.
    Login { username: String, password: String },
}

impl fmt::Debug for Credentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Credentials::Token(_) => f.write_str("Token(***)"),
            Credentials::Login { username, .. } => f
                .debug_struct("Login")
                .field("username", username)
                .field("password", &"***")
                .finish(),
        }
    }
}

/// Everything needed to talk to one server.
#[derive(Clone, Debug)]
pub struct ClientConfig {
    /// Base URL of the server (scheme + host, optional path prefix).
    pub host: Url,
    pub credentials: Credentials,
    /// Global per-request timeout.
    pub timeout: Duration,
    /// Page size requested from paginated endpoints.
    pub page_size: u32,
}

impl ClientConfig {
    /// Load configuration from environment variables, after merging a `.env`
    /// file from the working directory if there is one.
    pub fn from_env() -> Result<Self, CvatError> {
        let dotenv_found = dotenvy::dotenv().is_ok();
        log::debug!("Loaded `.env` file: {dotenv_found}");
        Self::from_lookup(|key| std::env::var(key).ok(), dotenv_found)
    }

    /// Build configuration from an arbitrary key lookup.
    ///
    /// `dotenv_found` only shapes the error hint for missing credentials.
    pub fn from_lookup<F>(lookup: F, dotenv_found: bool) -> Result<Self, CvatError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |key: &str| {
            lookup(key)
                .map(|value| value.trim().to_string())
                .filter(|value| !value.is_empty())
        };

        let host_raw = get("CVAT_HOST").unwrap_or_else(|| DEFAULT_HOST.to_string());
        let host = parse_host(&host_raw)?;

        let credentials = match get("CVAT_TOKEN") {
            Some(token) => Credentials::Token(token),
            None => {
                let hint = |name: &str| {
                    let mut hint = format!("environment variable '{name}' is not set");
                    if !dotenv_found {
                        hint.push_str("; did not find any `.env` file");
                    }
                    hint.push_str(" (alternatively set CVAT_TOKEN)");
                    hint
                };
                let username = get("CVAT_USERNAME").ok_or_else(|| CvatError::MissingSetting {
                    name: "CVAT_USERNAME",
                    hint: hint("CVAT_USERNAME"),
                })?;
                let password = get("CVAT_PASSWORD").ok_or_else(|| CvatError::MissingSetting {
                    name: "CVAT_PASSWORD",
                    hint: hint("CVAT_PASSWORD"),
                })?;
                Credentials::Login { username, password }
            }
        };

        let timeout_secs = match get("CVAT_TIMEOUT_SECS") {
            Some(raw) => raw.parse::<u64>().map_err(|_| CvatError::InvalidSetting {
                name: "CVAT_TIMEOUT_SECS",
                message: format!("'{raw}' is not a whole number of seconds"),
            })?,
            None => DEFAULT_TIMEOUT_SECS,
        };

        let page_size = match get("CVAT_PAGE_SIZE") {
            Some(raw) => match raw.parse::<u32>() {
                Ok(size) if size > 0 => size,
                _ => {
                    return Err(CvatError::InvalidSetting {
                        name: "CVAT_PAGE_SIZE",
                        message: format!("'{raw}' is not a positive integer"),
                    })
                }
            },
            None => DEFAULT_PAGE_SIZE,
        };

        Ok(Self {
            host,
            credentials,
            timeout: Duration::from_secs(timeout_secs),
            page_size,
        })
    }

    /// Join an API path (e.g. `api/tasks/5`) onto the configured host.
    pub fn endpoint(&self, path: &str) -> Result<String, CvatError> {
        self.host
            .join(path.trim_start_matches('/'))
            .map(String::from)
            .map_err(|source| CvatError::InvalidSetting {
                name: "CVAT_HOST",
                message: format!("cannot join '{path}': {source}"),
            })
    }
}

fn parse_host(raw: &str) -> Result<Url, CvatError> {
    // A trailing slash keeps any path prefix when joining endpoints.
    let normalized = if raw.ends_with('/') {
        raw.to_string()
    } else {
        format!("{raw}/")
    };
    let url = Url::parse(&normalized).map_err(|source| CvatError::InvalidSetting {
        name: "CVAT_HOST",
        message: format!("'{raw}' is not a valid URL: {source}"),
    })?;
    if url.scheme() != "http" && url.scheme() != "https" {
        return Err(CvatError::InvalidSetting {
            name: "CVAT_HOST",
            message: format!("expected an http(s) URL, found scheme '{}'", url.scheme()),
        });
    }
    Ok(url)
}
