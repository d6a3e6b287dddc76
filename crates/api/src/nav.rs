//! Signed-in user lookup and signing-key discovery (nav endpoint).

use reqwest::Client;
use serde_json::Value;
use tracing::debug;

use crate::error::ApiError;
use crate::headers::sanitize_header_value;

const NAV_URL: &str = "https://api.bilibili.com/x/web-interface/nav";

/// Desktop user agent used on the web API endpoints.
pub(crate) const DESKTOP_UA: &str =
    "Mozilla/5.0 (Windows NT 10; Win64; x64; rv:83.0) Gecko/20100101 Firefox/83.0";

/// Interesting parts of the nav response.
#[derive(Debug, Clone)]
pub struct NavInfo {
    /// User id, only present when the call carried a valid cookie.
    pub mid: Option<u64>,
    /// Current WBI image key (signature input).
    pub img_key: String,
    /// Current WBI sub key (signature input).
    pub sub_key: String,
}

/// Fetches the nav endpoint.
///
/// The signing keys are published even to anonymous callers (the endpoint
/// answers a non-zero code without a cookie but still carries `wbi_img`),
/// so only `mid` depends on authentication.
pub async fn fetch_nav(http: &Client, cookie: Option<&str>) -> Result<NavInfo, ApiError> {
    let mut request = http.get(NAV_URL).header("User-Agent", DESKTOP_UA);
    if let Some(cookie) = cookie {
        request = request.header("Cookie", sanitize_header_value(cookie));
    }
    let json: Value = request.send().await?.json().await?;

    let code = json.get("code").and_then(Value::as_i64).unwrap_or(-1);
    let data = json
        .get("data")
        .ok_or(ApiError::MissingField("data"))?;

    let img_key = key_from_url(
        data.pointer("/wbi_img/img_url")
            .and_then(Value::as_str)
            .ok_or(ApiError::MissingField("wbi_img.img_url"))?,
    );
    let sub_key = key_from_url(
        data.pointer("/wbi_img/sub_url")
            .and_then(Value::as_str)
            .ok_or(ApiError::MissingField("wbi_img.sub_url"))?,
    );

    let mid = if code == 0 {
        data.get("mid").and_then(Value::as_u64)
    } else {
        None
    };
    debug!(code, mid = ?mid, "nav fetched");

    Ok(NavInfo {
        mid,
        img_key,
        sub_key,
    })
}

/// Looks up the user id behind a session cookie.
pub async fn fetch_user_id(http: &Client, cookie: &str) -> Result<u64, ApiError> {
    let json: Value = http
        .get(NAV_URL)
        .header("User-Agent", DESKTOP_UA)
        .header("Cookie", sanitize_header_value(cookie))
        .send()
        .await?
        .json()
        .await?;

    let code = json.get("code").and_then(Value::as_i64).unwrap_or(-1);
    if code != 0 {
        let message = json
            .get("message")
            .and_then(Value::as_str)
            .unwrap_or("")
            .to_string();
        return Err(ApiError::Rejected { code, message });
    }
    json.pointer("/data/mid")
        .and_then(Value::as_u64)
        .ok_or(ApiError::MissingField("data.mid"))
}

/// The key is the filename of the published image URL, minus extension.
fn key_from_url(url: &str) -> String {
    url.rsplit('/')
        .next()
        .unwrap_or(url)
        .split('.')
        .next()
        .unwrap_or("")
        .to_string()
}
