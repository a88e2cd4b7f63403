mod oauth;
mod refresh;

pub use oauth::{
    open_authorize_page, verification_code_from_html, DeviceCode, DeviceIdentity, OAuthClient,
    OAuthToken, Pkce, OAUTH_HOST,
};
