//! Signed query strings for the web API.
//!
//! Requests carry a `w_rid` signature: md5 over the key-sorted,
//! percent-encoded query plus a "mixin key" derived from two rotating
//! keys published on the nav endpoint. Keys are cached for an hour.

use std::time::{Duration, Instant, SystemTime, UNIX_EPOCH};

use md5::{Digest, Md5};
use percent_encoding::{AsciiSet, NON_ALPHANUMERIC, utf8_percent_encode};
use tokio::sync::Mutex;
use tracing::debug;

use crate::error::ApiError;
use crate::nav;

/// How long fetched keys stay valid.
const KEY_TTL: Duration = Duration::from_secs(60 * 60);

/// Characters the platform strips from parameter values before signing.
const FILTERED_VALUE_CHARS: &[char] = &['!', '\'', '(', ')', '*'];

/// Everything except unreserved characters is percent-encoded.
const QUERY_ENCODE: &AsciiSet = &NON_ALPHANUMERIC
    .remove(b'-')
    .remove(b'_')
    .remove(b'.')
    .remove(b'~');

/// Permutation applied to the concatenated keys; the first 32 characters
/// of the result form the mixin key.
const MIXIN_KEY_ENC_TAB: [usize; 64] = [
    46, 47, 18, 2, 53, 8, 23, 32, 15, 50, 10, 31, 58, 3, 45, 35, 27, 43, 5, 49, 33, 9, 42, 19, 29,
    28, 14, 39, 12, 38, 41, 13, 37, 48, 7, 16, 24, 55, 40, 61, 26, 17, 0, 1, 60, 51, 30, 4, 22,
    25, 54, 21, 56, 59, 6, 63, 57, 62, 11, 36, 20, 34, 44, 52,
];

struct CachedKeys {
    img_key: String,
    sub_key: String,
    fetched_at: Instant,
}

/// Produces signed query strings, refreshing the signing keys as needed.
///
/// One signer is shared by all sessions in the process; the mutex makes
/// key refresh single-flight.
pub struct WbiSigner {
    http: reqwest::Client,
    keys: Mutex<Option<CachedKeys>>,
}

impl WbiSigner {
    pub fn new(http: reqwest::Client) -> Self {
        Self {
            http,
            keys: Mutex::new(None),
        }
    }

    /// Signs `params`, returning the full encoded query including `wts`
    /// and `w_rid`.
    pub async fn sign(&self, params: &[(&str, String)]) -> Result<String, ApiError> {
        let mixin = self.mixin_key().await?;
        let wts = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .unwrap_or_default()
            .as_secs();
        Ok(sign_with_key(params, &mixin, wts))
    }

    async fn mixin_key(&self) -> Result<String, ApiError> {
        let mut guard = self.keys.lock().await;
        let stale = match guard.as_ref() {
            Some(cached) => cached.fetched_at.elapsed() > KEY_TTL,
            None => true,
        };
        if stale {
            let nav = nav::fetch_nav(&self.http, None).await?;
            debug!("refreshed signing keys");
            *guard = Some(CachedKeys {
                img_key: nav.img_key,
                sub_key: nav.sub_key,
                fetched_at: Instant::now(),
            });
        }
        let cached = guard
            .as_ref()
            .ok_or(ApiError::MissingField("wbi keys"))?;
        Ok(mixin_key(&cached.img_key, &cached.sub_key))
    }
}

/// Derives the 32-character mixin key from the two published keys.
fn mixin_key(img_key: &str, sub_key: &str) -> String {
    let combined: Vec<char> = img_key.chars().chain(sub_key.chars()).collect();
    MIXIN_KEY_ENC_TAB
        .iter()
        .filter_map(|&i| combined.get(i))
        .take(32)
        .collect()
}

/// Builds the signed query for a fixed timestamp.
fn sign_with_key(params: &[(&str, String)], mixin_key: &str, wts: u64) -> String {
    let wts = wts.to_string();
    let mut entries: Vec<(&str, String)> = params
        .iter()
        .map(|(k, v)| {
            let filtered: String = v
                .chars()
                .filter(|c| !FILTERED_VALUE_CHARS.contains(c))
                .collect();
            (*k, filtered)
        })
        .collect();
    entries.push(("wts", wts));
    entries.sort_by(|a, b| a.0.cmp(b.0));

    let query = entries
        .iter()
        .map(|(k, v)| {
            format!(
                "{}={}",
                utf8_percent_encode(k, QUERY_ENCODE),
                utf8_percent_encode(v, QUERY_ENCODE)
            )
        })
        .collect::<Vec<_>>()
        .join("&");

    let digest = Md5::digest(format!("{query}{mixin_key}").as_bytes());
    let w_rid = hex::encode(digest);
    format!("{query}&w_rid={w_rid}")
}
