use crate::api::disk::build_blocking_client;
use crate::error::{DiskError, Result};
use std::thread;
use std::time::Duration;

use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use base64::Engine as _;
use rand::{distributions::Alphanumeric, Rng};
use reqwest::blocking::Client;
use serde::{de::DeserializeOwned, Deserialize};
use sha2::{Digest, Sha256};
use url::Url;

pub const OAUTH_HOST: &str = "https://oauth.yandex.ru";
const AUTHORIZE_PATH: &str = "authorize";
const DEVICE_CODE_PATH: &str = "device/code";
pub(super) const TOKEN_PATH: &str = "token";

/// Markers around the code on the page Yandex shows after sign-in, paired
/// with the text that ends the code.
const VERIFICATION_MARKERS: [(&str, &str); 2] = [
    ("verification_code%3Fcode%3D", "&"),
    ("class=\"verification-code-code\">", "<"),
];

/// Tokens handed out by the OAuth server.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct OAuthToken {
    pub access_token: String,
    pub expires_in: Option<u64>,
    pub refresh_token: Option<String>,
    pub token_type: Option<String>,
}

/// `device_id`/`device_name` pair that ties a token to one installation.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct DeviceIdentity {
    pub id: String,
    pub name: String,
}

/// Answer of `device/code`: show `user_code` and `verification_url` to the
/// user, then poll with `device_code`.
#[derive(Clone, Debug, Deserialize, PartialEq, Eq)]
pub struct DeviceCode {
    pub device_code: String,
    pub user_code: String,
    pub verification_url: String,
    #[serde(default = "default_interval")]
    pub interval: u64,
    #[serde(default)]
    pub expires_in: u64,
}

fn default_interval() -> u64 {
    5
}

#[derive(Clone, Debug)]
pub struct Pkce {
    pub verifier: String,
    pub challenge: String,
}

impl Pkce {
    pub fn generate() -> Self {
        let verifier = build_code_verifier();
        let challenge = build_code_challenge(&verifier);
        Self {
            verifier,
            challenge,
        }
    }
}

#[derive(Debug, Deserialize)]
pub(super) struct TokenResponse {
    access_token: Option<String>,
    refresh_token: Option<String>,
    expires_in: Option<u64>,
    token_type: Option<String>,
    error: Option<String>,
    error_description: Option<String>,
}

impl TokenResponse {
    fn is_pending(&self) -> bool {
        self.error.as_deref() == Some("authorization_pending")
    }

    pub(super) fn into_token(self) -> Result<OAuthToken> {
        if let Some(error) = self.error {
            return Err(DiskError::Api(self.error_description.unwrap_or(error)));
        }
        let access_token = self
            .access_token
            .ok_or_else(|| DiskError::Protocol("missing access_token in response".to_string()))?;
        Ok(OAuthToken {
            access_token,
            expires_in: self.expires_in,
            refresh_token: self.refresh_token,
            token_type: self.token_type,
        })
    }
}

#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum DeviceCodeResponse {
    Code(DeviceCode),
    Rejected {
        error: Option<String>,
        error_description: Option<String>,
    },
}

/// Talks to the Yandex OAuth server.
#[derive(Clone, Debug)]
pub struct OAuthClient {
    base_url: String,
    http: Client,
}

impl OAuthClient {
    pub fn new() -> Result<Self> {
        Self::with_base_url(OAUTH_HOST)
    }

    pub fn with_base_url(base_url: impl Into<String>) -> Result<Self> {
        Ok(Self {
            base_url: base_url.into().trim_end_matches('/').to_string(),
            http: build_blocking_client(Some(Duration::from_secs(30)))?,
        })
    }

    /// Page where the user grants access and receives a verification code.
    pub fn authorize_url(
        &self,
        client_id: &str,
        device: Option<&DeviceIdentity>,
        pkce: Option<&Pkce>,
    ) -> Result<String> {
        let mut url = Url::parse(&format!("{}/{AUTHORIZE_PATH}", self.base_url))
            .map_err(|e| DiskError::Config(format!("failed to parse authorize endpoint: {e}")))?;
        {
            let mut pairs = url.query_pairs_mut();
            pairs
                .append_pair("response_type", "code")
                .append_pair("client_id", client_id);
            if let Some(device) = device {
                pairs
                    .append_pair("device_id", &device.id)
                    .append_pair("device_name", &device.name);
            }
            if let Some(pkce) = pkce {
                pairs
                    .append_pair("code_challenge", &pkce.challenge)
                    .append_pair("code_challenge_method", "S256");
            }
        }
        Ok(url.into())
    }

    /// Trades the code the user copied from the authorize page for tokens.
    pub fn exchange_code(
        &self,
        client_id: &str,
        client_secret: &str,
        code: &str,
        device: Option<&DeviceIdentity>,
        pkce: Option<&Pkce>,
    ) -> Result<OAuthToken> {
        let mut params = vec![
            ("grant_type", "authorization_code"),
            ("code", code),
            ("client_id", client_id),
            ("client_secret", client_secret),
        ];
        if let Some(device) = device {
            params.push(("device_id", device.id.as_str()));
            params.push(("device_name", device.name.as_str()));
        }
        if let Some(pkce) = pkce {
            params.push(("code_verifier", pkce.verifier.as_str()));
        }
        let tokens = self
            .post_form::<TokenResponse>(TOKEN_PATH, &params)?
            .into_token()?;
        log::info!("[oauth] authorization code exchanged for a token");
        Ok(tokens)
    }

    /// Starts the device flow for clients that cannot show a browser.
    pub fn request_device_code(
        &self,
        client_id: &str,
        device: &DeviceIdentity,
    ) -> Result<DeviceCode> {
        let params = [
            ("client_id", client_id),
            ("device_id", device.id.as_str()),
            ("device_name", device.name.as_str()),
        ];
        match self.post_form::<DeviceCodeResponse>(DEVICE_CODE_PATH, &params)? {
            DeviceCodeResponse::Code(code) => Ok(code),
            DeviceCodeResponse::Rejected {
                error,
                error_description,
            } => Err(match error_description.or(error) {
                Some(message) => DiskError::Api(message),
                None => DiskError::Protocol("missing device_code in response".to_string()),
            }),
        }
    }

    /// Polls `token` every `interval` seconds until the user confirms the
    /// code or `expires_in` runs out.
    pub fn poll_device_token(
        &self,
        client_id: &str,
        client_secret: &str,
        code: &DeviceCode,
    ) -> Result<OAuthToken> {
        let params = [
            ("grant_type", "device_code"),
            ("code", code.device_code.as_str()),
            ("client_id", client_id),
            ("client_secret", client_secret),
        ];
        let step = code.interval.max(1);
        let mut waited = 0;
        loop {
            let payload = self.post_form::<TokenResponse>(TOKEN_PATH, &params)?;
            if !payload.is_pending() {
                let tokens = payload.into_token()?;
                log::info!("[oauth] device confirmed");
                return Ok(tokens);
            }
            if waited >= code.expires_in {
                return Err(DiskError::Api(
                    "device code expired before the user confirmed it".to_string(),
                ));
            }
            log::debug!("[oauth] waiting for user to enter {}", code.user_code);
            thread::sleep(Duration::from_secs(code.interval));
            waited += step;
        }
    }

    pub(super) fn post_form<T: DeserializeOwned>(
        &self,
        path: &str,
        params: &[(&str, &str)],
    ) -> Result<T> {
        let url = format!("{}/{path}", self.base_url);
        let response = self
            .http
            .post(url)
            .form(params)
            .send()
            .map_err(|e| DiskError::Transport(format!("{path} request failed: {e}")))?;
        let status = response.status();
        let body = response
            .text()
            .map_err(|e| DiskError::Transport(format!("failed to read {path} response: {e}")))?;

        // Rejections come back as 400 with a JSON body, so parse before
        // looking at the status.
        serde_json::from_str(&body).map_err(|e| {
            if status.is_success() {
                DiskError::Protocol(format!("failed to parse {path} response: {e}"))
            } else {
                DiskError::Transport(format!("oauth endpoint returned HTTP {status}"))
            }
        })
    }
}

/// Opens `url` in the default browser.
pub fn open_authorize_page(url: &str) -> Result<()> {
    webbrowser::open(url).map_err(|e| DiskError::Io(format!("failed to open browser: {e}")))
}

/// Pulls the verification code out of the page the browser lands on after
/// the user grants access.
pub fn verification_code_from_html(html: &str) -> Option<String> {
    VERIFICATION_MARKERS.iter().find_map(|(marker, end)| {
        let start = html.find(marker)? + marker.len();
        let rest = &html[start..];
        let code = &rest[..rest.find(end)?];
        (!code.is_empty()).then(|| code.to_string())
    })
}

fn build_code_verifier() -> String {
    rand::thread_rng()
        .sample_iter(&Alphanumeric)
        .take(64)
        .map(char::from)
        .collect()
}

fn build_code_challenge(code_verifier: &str) -> String {
    let digest = Sha256::digest(code_verifier.as_bytes());
    URL_SAFE_NO_PAD.encode(digest)
}
