use crate::error::{DiskError, Result};
use crate::settings::Config;
use percent_encoding::{utf8_percent_encode, NON_ALPHANUMERIC};
use reqwest::{
    blocking::{Client, RequestBuilder},
    redirect::Policy,
    Method,
};
use serde_json::Value;
use std::time::Duration;

use super::API_HOST;

/// Timeout applied to metadata calls unless overridden.
pub const DEFAULT_API_TIMEOUT: Duration = Duration::from_secs(30);

/// Connection settings for a [`DiskClient`].
///
/// `transfer_timeout` bounds a whole upload/download; `None` lets large
/// files take as long as they need.
#[derive(Clone, Debug)]
pub struct ClientOptions {
    pub base_url: String,
    pub timeout: Option<Duration>,
    pub transfer_timeout: Option<Duration>,
}

impl Default for ClientOptions {
    fn default() -> Self {
        Self {
            base_url: API_HOST.to_string(),
            timeout: Some(DEFAULT_API_TIMEOUT),
            transfer_timeout: None,
        }
    }
}

/// Authenticated handle to the Disk REST API.
///
/// Holds the OAuth token and two blocking HTTP clients; cloning is cheap and
/// clones share connections. There is no process-wide state: every call goes
/// through an explicit client.
#[derive(Clone)]
pub struct DiskClient {
    token: String,
    base_url: String,
    api: Client,
    transfer: Client,
}

impl std::fmt::Debug for DiskClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DiskClient")
            .field("base_url", &self.base_url)
            .finish_non_exhaustive()
    }
}

impl DiskClient {
    pub fn new(token: impl Into<String>) -> Result<Self> {
        Self::with_options(token, ClientOptions::default())
    }

    /// Points the client at another API host, e.g. a local stub server.
    pub fn with_base_url(token: impl Into<String>, base_url: impl Into<String>) -> Result<Self> {
        Self::with_options(
            token,
            ClientOptions {
                base_url: base_url.into(),
                ..ClientOptions::default()
            },
        )
    }

    pub fn with_options(token: impl Into<String>, options: ClientOptions) -> Result<Self> {
        let token = token.into();
        if token.trim().is_empty() {
            return Err(DiskError::Config("oauth token is required".to_string()));
        }
        Ok(Self {
            token,
            base_url: options.base_url.trim_end_matches('/').to_string(),
            api: build_blocking_client(options.timeout)?,
            transfer: build_blocking_client(options.transfer_timeout)?,
        })
    }

    /// Builds a client from the token stored in a config file.
    pub fn from_config(config: &Config) -> Result<Self> {
        let token = config
            .token
            .clone()
            .ok_or_else(|| DiskError::Config("no token in config; please sign in".to_string()))?;
        Self::new(token)
    }

    /// Issues one authenticated call against `<base>/<suffix>` and parses the
    /// body as JSON.
    ///
    /// The parsed document is returned whatever it describes: success shapes
    /// and `{"message": ...}` rejections alike are left to the caller. Query
    /// values are percent-encoded here; keys must already be URL-safe.
    pub fn api_call(
        &self,
        method: Method,
        suffix: &str,
        body: Option<&str>,
        query: &[(&str, &str)],
    ) -> Result<Value> {
        let url = build_url(&self.base_url, suffix, query);
        log::debug!("[disk-api] {method} {url}");

        let mut request = self
            .authorize(self.api.request(method, &url))
            .header("Content-Type", "application/json")
            .header("Accept", "application/json");
        if let Some(body) = body {
            request = request.body(body.to_string());
        }

        let response = request
            .send()
            .map_err(|e| DiskError::Transport(format!("failed to call {suffix}: {e}")))?;
        let status = response.status();
        let bytes = response
            .bytes()
            .map_err(|e| DiskError::Transport(format!("failed to read {suffix} response: {e}")))?;

        if bytes.iter().all(u8::is_ascii_whitespace) {
            if status.is_success() {
                // 202/204 answers to PUT/DELETE carry no body.
                return Ok(Value::Null);
            }
            return Err(DiskError::Transport(format!(
                "disk api returned HTTP {status} with an empty body"
            )));
        }

        match serde_json::from_slice::<Value>(&bytes) {
            Ok(json) => Ok(json),
            Err(_) if !status.is_success() => Err(DiskError::Transport(format!(
                "disk api returned HTTP {status}"
            ))),
            Err(e) => Err(DiskError::Protocol(format!(
                "failed to parse {suffix} response: {e}"
            ))),
        }
    }

    /// Looks up `href` in a document, turning its absence into an error.
    pub(crate) fn href_of(json: &Value) -> Result<String> {
        json.get("href")
            .and_then(Value::as_str)
            .map(str::to_string)
            .ok_or_else(|| DiskError::from_document(json, "href"))
    }

    pub(crate) fn authorize(&self, request: RequestBuilder) -> RequestBuilder {
        request.header("Authorization", format!("OAuth {}", self.token))
    }

    pub(crate) fn transfer_http(&self) -> &Client {
        &self.transfer
    }
}

/// Appends `?k=v&k=v` in the given order, encoding each value.
pub(crate) fn build_url(base: &str, suffix: &str, query: &[(&str, &str)]) -> String {
    let mut url = format!("{base}/{}", suffix.trim_start_matches('/'));
    for (index, (key, value)) in query.iter().enumerate() {
        url.push(if index == 0 { '?' } else { '&' });
        url.push_str(key);
        url.push('=');
        url.extend(utf8_percent_encode(value, NON_ALPHANUMERIC));
    }
    url
}

/// Blocking client with the shared redirect policy. `None` disables the
/// timeout entirely (reqwest's blocking default is 30 s).
pub(crate) fn build_blocking_client(timeout: Option<Duration>) -> Result<Client> {
    Client::builder()
        .timeout(timeout)
        .redirect(Policy::limited(10))
        .build()
        .map_err(|e| DiskError::Transport(format!("failed to build HTTP client: {e}")))
}
