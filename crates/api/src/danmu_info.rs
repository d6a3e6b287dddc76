//! Danmaku-info endpoint: short-lived auth token plus candidate hosts.

use reqwest::Client;
use serde::Deserialize;
use tracing::debug;

use crate::error::ApiError;
use crate::headers::sanitize_header_value;
use crate::nav::DESKTOP_UA;
use crate::wbi::WbiSigner;

const DANMU_INFO_URL: &str =
    "https://api.live.bilibili.com/xlive/web-room/v1/index/getDanmuInfo";

/// One candidate chat host with its per-transport ports.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct HostEntry {
    pub host: String,
    pub port: u16,
    pub ws_port: u16,
    pub wss_port: u16,
}

/// Token and host candidates for one room.
#[derive(Debug, Clone, Deserialize)]
pub struct DanmuInfo {
    pub token: String,
    #[serde(default)]
    pub host_list: Vec<HostEntry>,
}

/// Standard `{code, message, data}` response wrapper.
#[derive(Debug, Deserialize)]
struct ApiResponse<T> {
    code: i64,
    #[serde(default)]
    message: String,
    data: Option<T>,
}

impl<T> ApiResponse<T> {
    fn into_data(self) -> Result<T, ApiError> {
        if self.code != 0 {
            return Err(ApiError::Rejected {
                code: self.code,
                message: self.message,
            });
        }
        self.data.ok_or(ApiError::MissingField("data"))
    }
}

/// Fetches the auth token and host list for a room.
///
/// The query is WBI-signed; the caller's session cookie, if any, rides
/// along sanitized (raw cookie content may contain illegal header bytes).
pub async fn fetch_danmu_info(
    http: &Client,
    signer: &WbiSigner,
    room_id: u64,
    cookie: Option<&str>,
) -> Result<DanmuInfo, ApiError> {
    let query = signer
        .sign(&[("id", room_id.to_string()), ("type", "0".to_string())])
        .await?;
    let url = format!("{DANMU_INFO_URL}?{query}");

    let mut request = http.get(&url).header("User-Agent", DESKTOP_UA);
    if let Some(cookie) = cookie {
        request = request.header("Cookie", sanitize_header_value(cookie));
    }

    let response: ApiResponse<DanmuInfo> = request.send().await?.json().await?;
    let info = response.into_data()?;
    debug!(room_id, hosts = info.host_list.len(), "danmu info fetched");
    Ok(info)
}
