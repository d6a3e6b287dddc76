//! HTTP collaborators for the chat client.
//!
//! The core protocol engine consumes three secured endpoints: the
//! danmaku-info service (auth token + candidate hosts, WBI-signed), the
//! tracking-id page, and the nav endpoint (signing keys + cookie uid).

pub mod buvid;
pub mod danmu_info;
mod error;
pub mod headers;
pub mod nav;
pub mod wbi;

pub use buvid::fetch_buvid;
pub use danmu_info::{DanmuInfo, HostEntry, fetch_danmu_info};
pub use error::ApiError;
pub use headers::sanitize_header_value;
pub use nav::{NavInfo, fetch_nav, fetch_user_id};
pub use wbi::WbiSigner;
