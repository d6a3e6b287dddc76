//! Tracking-id (buvid) acquisition.
//!
//! The id arrives as a `buvid<digit>=...` cookie on an otherwise
//! uninteresting page. It identifies the "device" in the join handshake
//! and is refreshed periodically by the session layer's shared cache.

use reqwest::Client;
use tracing::debug;

use crate::error::ApiError;

const BUVID_URL: &str = "https://data.bilibili.com/v/";

const BROWSER_UA: &str = "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 \
     (KHTML, like Gecko) Chrome/114.0.0.0 Safari/537.36";

/// Fetches a fresh tracking id from the platform's cookie-setting page.
pub async fn fetch_buvid(http: &Client) -> Result<String, ApiError> {
    let response = http
        .get(BUVID_URL)
        .header("User-Agent", BROWSER_UA)
        .header("Upgrade-Insecure-Requests", "1")
        .send()
        .await?;

    for value in response.headers().get_all(reqwest::header::SET_COOKIE) {
        if let Ok(text) = value.to_str() {
            if let Some(id) = extract_buvid(text) {
                debug!(buvid = %id, "tracking id refreshed");
                return Ok(id.to_string());
            }
        }
    }
    Err(ApiError::MissingField("buvid cookie"))
}

/// Pulls the id out of one `Set-Cookie` value shaped
/// `buvid<digit>=<value>; <attributes>`.
fn extract_buvid(set_cookie: &str) -> Option<&str> {
    let rest = set_cookie.trim_start();
    let eq = rest.find('=')?;
    let (name, tail) = rest.split_at(eq);
    let suffix = name.strip_prefix("buvid")?;
    if suffix.is_empty() || !suffix.bytes().all(|b| b.is_ascii_digit()) {
        return None;
    }
    let value = tail[1..].split(';').next()?.trim();
    if value.is_empty() { None } else { Some(value) }
}
