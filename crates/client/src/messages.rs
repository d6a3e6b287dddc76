//! Typed message payloads extracted from command envelopes.
//!
//! Extraction follows the platform's envelope shapes: most commands keep
//! their payload under `data`, the chat command packs everything into the
//! positional `info` array. Numeric fields arrive as numbers or numeric
//! strings depending on the command, so the accessors accept both.

use blive_protocol::CommandEnvelope;
use serde_json::Value;

use crate::error::ClassificationError;

/// One decoded unit delivered to listeners: the raw envelope (absent only
/// for popularity events, which have no JSON body) plus the typed payload.
/// Never mutated after dispatch.
#[derive(Debug, Clone, PartialEq)]
pub struct Message {
    envelope: Option<CommandEnvelope>,
    payload: MessagePayload,
}

impl Message {
    pub(crate) fn command(envelope: CommandEnvelope, payload: MessagePayload) -> Self {
        Self {
            envelope: Some(envelope),
            payload,
        }
    }

    pub(crate) fn popularity(count: u32) -> Self {
        Self {
            envelope: None,
            payload: MessagePayload::Popularity(count),
        }
    }

    /// The envelope as it arrived, when the message came from a command.
    pub fn envelope(&self) -> Option<&CommandEnvelope> {
        self.envelope.as_ref()
    }

    /// The raw JSON text, when available.
    pub fn raw(&self) -> Option<&str> {
        self.envelope.as_ref().map(CommandEnvelope::raw)
    }

    pub fn payload(&self) -> &MessagePayload {
        &self.payload
    }
}

/// Typed fields per message kind. Kinds without a dedicated shape carry
/// [`MessagePayload::Generic`]; their data stays reachable via the envelope.
#[derive(Debug, Clone, PartialEq)]
pub enum MessagePayload {
    Danmu(Danmu),
    Gift(Gift),
    SuperChat(SuperChat),
    GuardBuy(GuardBuy),
    InteractWord(InteractWord),
    WatchedChange(WatchedChange),
    OnlineRankCount(OnlineRankCount),
    LikeUpdate(LikeUpdate),
    RoomBlock(RoomBlock),
    Warning(Warning),
    RoomChange(RoomChange),
    VirtualMvp(VirtualMvp),
    Popularity(u32),
    Generic,
}

/// A chat line.
#[derive(Debug, Clone, PartialEq)]
pub struct Danmu {
    pub user_id: u64,
    pub username: String,
    pub content: String,
    /// Fan medal, empty when the sender wears none.
    pub medal: String,
    pub medal_level: i64,
    pub medal_owner: String,
    /// 0 none, 1/2/3 descending guard tiers.
    pub guard_level: i64,
    pub admin: bool,
    pub vip: bool,
    pub emoticon_url: Option<String>,
    pub emoticon_name: Option<String>,
    /// Send time, unix milliseconds.
    pub timestamp_ms: i64,
}

impl Danmu {
    pub(crate) fn from_envelope(env: &CommandEnvelope) -> Result<Self, ClassificationError> {
        let info = env
            .info()
            .ok_or(ClassificationError::MissingField("info"))?;
        let meta = info
            .get(0)
            .ok_or(ClassificationError::MissingField("info[0]"))?;
        let user = info
            .get(2)
            .ok_or(ClassificationError::MissingField("info[2]"))?;

        // Medal triple is an empty array when no medal is worn.
        let medal_block = info.get(3).and_then(Value::as_array);
        let (medal_level, medal, medal_owner) = match medal_block {
            Some(block) if !block.is_empty() => (
                block.first().and_then(Value::as_i64).unwrap_or(0),
                block
                    .get(1)
                    .and_then(Value::as_str)
                    .unwrap_or_default()
                    .to_string(),
                block
                    .get(2)
                    .and_then(Value::as_str)
                    .unwrap_or_default()
                    .to_string(),
            ),
            _ => (0, String::new(), String::new()),
        };

        let emoticon = meta.get(13).filter(|v| v.is_object());

        Ok(Self {
            user_id: index_int(user, 0)? as u64,
            username: index_str(user, 1)?.to_string(),
            content: info
                .get(1)
                .and_then(Value::as_str)
                .ok_or(ClassificationError::MissingField("info[1]"))?
                .to_string(),
            medal,
            medal_level,
            medal_owner,
            guard_level: info.get(7).and_then(Value::as_i64).unwrap_or(0),
            admin: index_int(user, 2).unwrap_or(0) == 1,
            vip: index_int(user, 3).unwrap_or(0) == 1,
            emoticon_url: emoticon
                .and_then(|e| e.get("url"))
                .and_then(Value::as_str)
                .map(|u| u.replace("http://", "https://")),
            emoticon_name: emoticon
                .and_then(|e| e.get("emoticon_unique"))
                .and_then(Value::as_str)
                .map(str::to_string),
            timestamp_ms: meta.get(4).and_then(Value::as_i64).unwrap_or(0),
        })
    }
}

/// A gift, possibly part of a combo.
#[derive(Debug, Clone, PartialEq)]
pub struct Gift {
    pub gift_name: String,
    pub gift_id: i64,
    pub num: i64,
    pub username: String,
    pub user_id: u64,
    pub face_url: String,
    /// `gold` is paid currency, `silver` is free.
    pub coin_type: String,
    pub price: f64,
    pub total_coin: i64,
    pub timestamp: i64,
}

impl Gift {
    pub(crate) fn from_envelope(env: &CommandEnvelope) -> Result<Self, ClassificationError> {
        let data = data(env)?;
        Ok(Self {
            gift_name: str_field(data, "giftName")?.to_string(),
            gift_id: int_field(data, "giftId")?,
            num: int_field(data, "num")?,
            username: str_field(data, "uname")?.to_string(),
            user_id: int_field(data, "uid")? as u64,
            face_url: str_field(data, "face").unwrap_or_default().to_string(),
            coin_type: str_field(data, "coin_type").unwrap_or_default().to_string(),
            price: data.get("price").and_then(Value::as_f64).unwrap_or(0.0),
            total_coin: int_field(data, "total_coin").unwrap_or(0),
            timestamp: int_field(data, "timestamp").unwrap_or(0),
        })
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct SuperChat {
    pub user_id: u64,
    pub username: String,
    pub price: i64,
    pub start_time: i64,
    pub end_time: i64,
    pub message: String,
    /// Translation shown on the JP variant of the command.
    pub message_jpn: Option<String>,
    pub timestamp: i64,
}

impl SuperChat {
    pub(crate) fn from_envelope(env: &CommandEnvelope) -> Result<Self, ClassificationError> {
        let data = data(env)?;
        Ok(Self {
            user_id: int_field(data, "uid")? as u64,
            username: data
                .pointer("/user_info/uname")
                .and_then(Value::as_str)
                .ok_or(ClassificationError::MissingField("user_info.uname"))?
                .to_string(),
            price: int_field(data, "price")?,
            start_time: int_field(data, "start_time").unwrap_or(0),
            end_time: int_field(data, "end_time").unwrap_or(0),
            message: str_field(data, "message").unwrap_or_default().to_string(),
            message_jpn: data
                .get("message_jpn")
                .and_then(Value::as_str)
                .map(str::to_string),
            timestamp: int_field(data, "ts").unwrap_or(0),
        })
    }
}

/// A guard/membership purchase (the toast shape carries both the legacy
/// and the primary event).
#[derive(Debug, Clone, PartialEq)]
pub struct GuardBuy {
    pub op_type: i64,
    pub user_id: u64,
    pub username: String,
    pub num: i64,
    pub guard_level: i64,
    /// Actual paid price in coins (renewals differ from first purchase).
    pub price: i64,
    pub role_name: String,
    pub unit: String,
    pub toast: String,
}

impl GuardBuy {
    pub(crate) fn from_envelope(env: &CommandEnvelope) -> Result<Self, ClassificationError> {
        let data = data(env)?;
        Ok(Self {
            op_type: int_field(data, "op_type").unwrap_or(0),
            user_id: int_field(data, "uid")? as u64,
            username: str_field(data, "username")?.to_string(),
            num: int_field(data, "num").unwrap_or(1),
            guard_level: int_field(data, "guard_level")?,
            price: int_field(data, "price").unwrap_or(0),
            role_name: str_field(data, "role_name").unwrap_or_default().to_string(),
            unit: str_field(data, "unit").unwrap_or_default().to_string(),
            toast: str_field(data, "toast_msg").unwrap_or_default().to_string(),
        })
    }
}

/// A viewer entering the room (or following/sharing, per `msg_type`).
#[derive(Debug, Clone, PartialEq)]
pub struct InteractWord {
    pub user_id: u64,
    pub username: String,
    pub medal: String,
    pub medal_level: i64,
    pub medal_owner_id: u64,
    pub timestamp: i64,
}

impl InteractWord {
    pub(crate) fn from_envelope(env: &CommandEnvelope) -> Result<Self, ClassificationError> {
        let data = data(env)?;
        Ok(Self {
            user_id: int_field(data, "uid")? as u64,
            username: str_field(data, "uname").unwrap_or_default().to_string(),
            medal: data
                .pointer("/fans_medal/medal_name")
                .and_then(Value::as_str)
                .unwrap_or_default()
                .to_string(),
            medal_level: data
                .pointer("/fans_medal/medal_level")
                .and_then(Value::as_i64)
                .unwrap_or(0),
            medal_owner_id: data
                .pointer("/fans_medal/target_id")
                .and_then(Value::as_u64)
                .unwrap_or(0),
            timestamp: int_field(data, "timestamp").unwrap_or(0),
        })
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct WatchedChange {
    pub num: i64,
}

impl WatchedChange {
    pub(crate) fn from_envelope(env: &CommandEnvelope) -> Result<Self, ClassificationError> {
        Ok(Self {
            num: int_field(data(env)?, "num")?,
        })
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct OnlineRankCount {
    pub count: i64,
}

impl OnlineRankCount {
    pub(crate) fn from_envelope(env: &CommandEnvelope) -> Result<Self, ClassificationError> {
        Ok(Self {
            count: int_field(data(env)?, "count")?,
        })
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LikeUpdate {
    pub click_count: i64,
}

impl LikeUpdate {
    pub(crate) fn from_envelope(env: &CommandEnvelope) -> Result<Self, ClassificationError> {
        Ok(Self {
            click_count: int_field(data(env)?, "click_count")?,
        })
    }
}

/// A viewer was muted by a moderator.
#[derive(Debug, Clone, PartialEq)]
pub struct RoomBlock {
    pub user_id: u64,
    pub username: String,
}

impl RoomBlock {
    pub(crate) fn from_envelope(env: &CommandEnvelope) -> Result<Self, ClassificationError> {
        let data = data(env)?;
        Ok(Self {
            user_id: int_field(data, "uid")? as u64,
            username: str_field(data, "uname")?.to_string(),
        })
    }
}

/// A platform warning directed at the streamer. The text lives at the
/// envelope's top level, not under `data`.
#[derive(Debug, Clone, PartialEq)]
pub struct Warning {
    pub message: String,
}

impl Warning {
    pub(crate) fn from_envelope(env: &CommandEnvelope) -> Result<Self, ClassificationError> {
        Ok(Self {
            message: env
                .value()
                .get("msg")
                .and_then(Value::as_str)
                .ok_or(ClassificationError::MissingField("msg"))?
                .to_string(),
        })
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct RoomChange {
    pub title: String,
    pub area_id: i64,
    pub parent_area_id: i64,
    pub area_name: String,
    pub parent_area_name: String,
}

impl RoomChange {
    pub(crate) fn from_envelope(env: &CommandEnvelope) -> Result<Self, ClassificationError> {
        let data = data(env)?;
        Ok(Self {
            title: str_field(data, "title")?.to_string(),
            area_id: int_field(data, "area_id").unwrap_or(0),
            parent_area_id: int_field(data, "parent_area_id").unwrap_or(0),
            area_name: str_field(data, "area_name").unwrap_or_default().to_string(),
            parent_area_name: str_field(data, "parent_area_name")
                .unwrap_or_default()
                .to_string(),
        })
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct VirtualMvp {
    pub goods_name: String,
    pub goods_num: i64,
    pub goods_price: i64,
    pub toast: String,
    pub user_id: u64,
    pub username: String,
    pub timestamp: i64,
}

impl VirtualMvp {
    pub(crate) fn from_envelope(env: &CommandEnvelope) -> Result<Self, ClassificationError> {
        let data = data(env)?;
        Ok(Self {
            goods_name: str_field(data, "goods_name")?.to_string(),
            goods_num: int_field(data, "goods_num").unwrap_or(1),
            goods_price: int_field(data, "goods_price").unwrap_or(0),
            toast: str_field(data, "success_toast")
                .unwrap_or_default()
                .to_string(),
            user_id: int_field(data, "uid")? as u64,
            username: str_field(data, "uname").unwrap_or_default().to_string(),
            timestamp: int_field(data, "timestamp").unwrap_or(0),
        })
    }
}

// ---------------------------------------------------------------------------
// Field access helpers.
// ---------------------------------------------------------------------------

fn data(env: &CommandEnvelope) -> Result<&Value, ClassificationError> {
    env.data().ok_or(ClassificationError::MissingField("data"))
}

fn str_field<'a>(v: &'a Value, key: &'static str) -> Result<&'a str, ClassificationError> {
    v.get(key)
        .and_then(Value::as_str)
        .ok_or(ClassificationError::MissingField(key))
}

/// Integer field that may arrive as a number or a numeric string.
fn int_field(v: &Value, key: &'static str) -> Result<i64, ClassificationError> {
    match v.get(key) {
        Some(Value::Number(n)) => n.as_i64().ok_or(ClassificationError::InvalidField(key)),
        Some(Value::String(s)) => s
            .parse()
            .map_err(|_| ClassificationError::InvalidField(key)),
        _ => Err(ClassificationError::MissingField(key)),
    }
}

/// Positional variant of [`int_field`] for the chat command's `info` array.
fn index_int(v: &Value, idx: usize) -> Result<i64, ClassificationError> {
    match v.get(idx) {
        Some(Value::Number(n)) => n.as_i64().ok_or(ClassificationError::InvalidField("info")),
        Some(Value::String(s)) => s
            .parse()
            .map_err(|_| ClassificationError::InvalidField("info")),
        _ => Err(ClassificationError::MissingField("info")),
    }
}

fn index_str(v: &Value, idx: usize) -> Result<&str, ClassificationError> {
    v.get(idx)
        .and_then(Value::as_str)
        .ok_or(ClassificationError::MissingField("info"))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn env(json: &str) -> CommandEnvelope {
        CommandEnvelope::parse(json).unwrap()
    }

    #[test]
    fn danmu_extraction() {
        let e = env(
            r#"{"cmd":"DANMU_MSG","info":[
                [0,1,25,16777215,1700000000000,0,0,"",0,0,0,"",0,"{}","{}",{},{}],
                "hello world",
                [12345,"alice","1","0",0,0,0,""],
                [21,"fans","bob",100,0,"",0],
                [0,0,0,0],["",""],0,3,null,{"ct":"A1"},0,0,null,null
            ]}"#,
        );
        let d = Danmu::from_envelope(&e).unwrap();
        assert_eq!(d.user_id, 12345);
        assert_eq!(d.username, "alice");
        assert_eq!(d.content, "hello world");
        assert_eq!(d.medal_level, 21);
        assert_eq!(d.medal, "fans");
        assert_eq!(d.medal_owner, "bob");
        assert_eq!(d.guard_level, 3);
        assert!(d.admin);
        assert!(!d.vip);
        assert_eq!(d.timestamp_ms, 1700000000000);
        assert!(d.emoticon_url.is_none());
    }

    #[test]
    fn danmu_without_medal() {
        let e = env(
            r#"{"cmd":"DANMU_MSG","info":[
                [0,1,25,16777215,1700000000000,0,0,"",0,0,0],
                "hi",
                [7,"bob",0,0,0,0,0,""],
                [],
                [],[],0,0,null,{}
            ]}"#,
        );
        let d = Danmu::from_envelope(&e).unwrap();
        assert_eq!(d.medal, "");
        assert_eq!(d.medal_level, 0);
        assert!(!d.admin);
    }

    #[test]
    fn danmu_emoticon_normalizes_scheme() {
        let e = env(
            r#"{"cmd":"DANMU_MSG","info":[
                [0,1,25,0,0,0,0,"",0,0,0,"",0,{"url":"http://cdn/e.png","emoticon_unique":"official_147"}],
                "[dog]",
                [1,"c",0,0,0,0,0,""],
                [],[],[],0,0,null,{}
            ]}"#,
        );
        let d = Danmu::from_envelope(&e).unwrap();
        assert_eq!(d.emoticon_url.as_deref(), Some("https://cdn/e.png"));
        assert_eq!(d.emoticon_name.as_deref(), Some("official_147"));
    }

    #[test]
    fn danmu_missing_info_fails() {
        let e = env(r#"{"cmd":"DANMU_MSG","data":{}}"#);
        assert!(matches!(
            Danmu::from_envelope(&e),
            Err(ClassificationError::MissingField("info"))
        ));
    }

    #[test]
    fn gift_extraction_accepts_string_numbers() {
        let e = env(
            r#"{"cmd":"SEND_GIFT","data":{
                "giftName":"flower","giftId":"31036","num":5,"uname":"carol",
                "uid":99,"face":"https://cdn/f.png","coin_type":"gold",
                "price":100.0,"total_coin":"500","timestamp":1700000000
            }}"#,
        );
        let g = Gift::from_envelope(&e).unwrap();
        assert_eq!(g.gift_id, 31036);
        assert_eq!(g.num, 5);
        assert_eq!(g.total_coin, 500);
        assert_eq!(g.coin_type, "gold");
    }

    #[test]
    fn superchat_extraction() {
        let e = env(
            r#"{"cmd":"SUPER_CHAT_MESSAGE","data":{
                "uid":7,"user_info":{"uname":"dan"},"price":30,
                "start_time":100,"end_time":160,"message":"nice stream",
                "message_jpn":"いい配信","ts":1700000001
            }}"#,
        );
        let sc = SuperChat::from_envelope(&e).unwrap();
        assert_eq!(sc.username, "dan");
        assert_eq!(sc.price, 30);
        assert_eq!(sc.message_jpn.as_deref(), Some("いい配信"));
    }

    #[test]
    fn guard_buy_extraction() {
        let e = env(
            r#"{"cmd":"USER_TOAST_MSG","data":{
                "op_type":1,"uid":11,"username":"eve","num":1,"guard_level":3,
                "price":158000,"role_name":"舰长","unit":"月","toast_msg":"eve 开通了舰长"
            }}"#,
        );
        let g = GuardBuy::from_envelope(&e).unwrap();
        assert_eq!(g.guard_level, 3);
        assert_eq!(g.price, 158000);
        assert_eq!(g.role_name, "舰长");
    }

    #[test]
    fn warning_reads_top_level_msg() {
        let e = env(r#"{"cmd":"WARNING","msg":"请规范直播内容"}"#);
        let w = Warning::from_envelope(&e).unwrap();
        assert_eq!(w.message, "请规范直播内容");
    }

    #[test]
    fn counters_extract() {
        let w = WatchedChange::from_envelope(&env(
            r#"{"cmd":"WATCHED_CHANGE","data":{"num":1024}}"#,
        ))
        .unwrap();
        assert_eq!(w.num, 1024);

        let r = OnlineRankCount::from_envelope(&env(
            r#"{"cmd":"ONLINE_RANK_COUNT","data":{"count":33}}"#,
        ))
        .unwrap();
        assert_eq!(r.count, 33);

        let l = LikeUpdate::from_envelope(&env(
            r#"{"cmd":"LIKE_INFO_V3_UPDATE","data":{"click_count":808}}"#,
        ))
        .unwrap();
        assert_eq!(l.click_count, 808);
    }

    #[test]
    fn interact_word_extraction() {
        let e = env(
            r#"{"cmd":"INTERACT_WORD","data":{
                "uid":5,"uname":"fred","timestamp":1700000002,
                "fans_medal":{"medal_name":"fans","medal_level":9,"target_id":777}
            }}"#,
        );
        let i = InteractWord::from_envelope(&e).unwrap();
        assert_eq!(i.medal_level, 9);
        assert_eq!(i.medal_owner_id, 777);
    }

    #[test]
    fn room_change_extraction() {
        let e = env(
            r#"{"cmd":"ROOM_CHANGE","data":{
                "title":"new title","area_id":371,"parent_area_id":9,
                "area_name":"虚拟主播","parent_area_name":"虚拟直播"
            }}"#,
        );
        let rc = RoomChange::from_envelope(&e).unwrap();
        assert_eq!(rc.title, "new title");
        assert_eq!(rc.area_id, 371);
    }

    #[test]
    fn missing_required_field_is_classification_error() {
        let e = env(r#"{"cmd":"SEND_GIFT","data":{"giftName":"flower"}}"#);
        assert!(Gift::from_envelope(&e).is_err());
    }
}
