//! WebSocket bindings (plain and TLS).
//!
//! The platform rejects handshakes that look automated, so the upgrade
//! request carries the web player's origin, a realistic user agent and a
//! randomized forwarded-for address. Headers are set directly on the
//! client request; no restricted-header workarounds are needed here.

use futures_util::StreamExt;
use rand::Rng;
use tokio_tungstenite::tungstenite::client::IntoClientRequest;
use tokio_tungstenite::tungstenite::http::HeaderValue;
use tracing::debug;

use crate::error::TransportError;
use crate::{CONNECT_TIMEOUT, TransportReader, TransportWriter};

/// Web origin expected by the chat endpoint.
const ORIGIN: &str = "https://live.bilibili.com";

/// Subscription path on the chat host.
const WS_PATH: &str = "/sub";

/// Desktop user agents rotated across connections.
const USER_AGENTS: &[&str] = &[
    "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 (KHTML, like Gecko) \
     Chrome/120.0.0.0 Safari/537.36",
    "Mozilla/5.0 (Windows NT 10.0; Win64; x64; rv:121.0) Gecko/20100101 Firefox/121.0",
    "Mozilla/5.0 (Macintosh; Intel Mac OS X 10_15_7) AppleWebKit/537.36 (KHTML, like Gecko) \
     Chrome/119.0.0.0 Safari/537.36",
    "Mozilla/5.0 (X11; Linux x86_64) AppleWebKit/537.36 (KHTML, like Gecko) \
     Chrome/120.0.0.0 Safari/537.36",
];

/// Picks a user agent for this connection.
pub fn random_user_agent() -> &'static str {
    let idx = rand::thread_rng().gen_range(0..USER_AGENTS.len());
    USER_AGENTS[idx]
}

/// A random IPv4 in dotted form, used for the forwarded-for header.
pub fn random_forwarded_ip() -> String {
    let octets: [u8; 4] = rand::thread_rng().r#gen();
    format!(
        "{}.{}.{}.{}",
        octets[0], octets[1], octets[2], octets[3]
    )
}

/// Opens a WebSocket (`secure` selects wss) to `host:port/sub`.
pub(crate) async fn connect(
    host: &str,
    port: u16,
    secure: bool,
) -> Result<(TransportWriter, TransportReader), TransportError> {
    let scheme = if secure { "wss" } else { "ws" };
    let url = format!("{scheme}://{host}:{port}{WS_PATH}");

    let mut request = url.as_str().into_client_request()?;
    let headers = request.headers_mut();
    headers.insert("Origin", HeaderValue::from_static(ORIGIN));
    headers.insert("Referer", HeaderValue::from_static("https://live.bilibili.com/"));
    headers.insert("User-Agent", HeaderValue::from_static(random_user_agent()));
    headers.insert("Accept-Language", HeaderValue::from_static("zh-CN"));
    headers.insert("Accept", HeaderValue::from_static("*/*"));
    headers.insert("Pragma", HeaderValue::from_static("no-cache"));
    headers.insert("Cache-Control", HeaderValue::from_static("no-cache"));
    headers.insert(
        "X-Forwarded-For",
        HeaderValue::from_str(&random_forwarded_ip())?,
    );

    let (stream, _response) = tokio::time::timeout(
        CONNECT_TIMEOUT,
        tokio_tungstenite::connect_async(request),
    )
    .await
    .map_err(|_| TransportError::Timeout)??;
    debug!(%url, "websocket transport connected");

    let (write, read) = stream.split();
    Ok((TransportWriter::Ws(write), TransportReader::Ws(read)))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn forwarded_ip_is_dotted_quad() {
        let ip = random_forwarded_ip();
        let parts: Vec<&str> = ip.split('.').collect();
        assert_eq!(parts.len(), 4);
        for p in parts {
            p.parse::<u8>().unwrap();
        }
    }

    #[test]
    fn user_agent_comes_from_pool() {
        let ua = random_user_agent();
        assert!(USER_AGENTS.contains(&ua));
    }

    #[tokio::test]
    async fn rejected_upgrade_surfaces_as_error() {
        // A bare TCP listener that answers the upgrade with garbage.
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();

        tokio::spawn(async move {
            let (mut sock, _) = listener.accept().await.unwrap();
            use tokio::io::AsyncWriteExt;
            let _ = sock
                .write_all(b"HTTP/1.1 403 Forbidden\r\ncontent-length: 0\r\n\r\n")
                .await;
        });

        let result = connect(&addr.ip().to_string(), addr.port(), false).await;
        assert!(result.is_err());
    }
}
