use super::oauth::{OAuthClient, OAuthToken, TokenResponse, TOKEN_PATH};
use crate::error::Result;

impl OAuthClient {
    /// Gets a fresh access token. When the server does not rotate the
    /// refresh token, the old one is kept.
    pub fn refresh_token(
        &self,
        client_id: &str,
        client_secret: &str,
        refresh_token: &str,
    ) -> Result<OAuthToken> {
        let params = [
            ("grant_type", "refresh_token"),
            ("refresh_token", refresh_token),
            ("client_id", client_id),
            ("client_secret", client_secret),
        ];
        let mut tokens = self
            .post_form::<TokenResponse>(TOKEN_PATH, &params)?
            .into_token()?;
        if tokens.refresh_token.is_none() {
            tokens.refresh_token = Some(refresh_token.to_string());
        }
        log::info!("[oauth] access token refreshed");
        Ok(tokens)
    }
}
