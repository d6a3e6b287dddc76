//! Command classification and the kind → constructor table.

use blive_protocol::CommandEnvelope;

use crate::error::ClassificationError;
use crate::messages::{
    Danmu, Gift, GuardBuy, InteractWord, LikeUpdate, MessagePayload, OnlineRankCount, RoomBlock,
    RoomChange, SuperChat, VirtualMvp, Warning, WatchedChange,
};

/// The known command vocabulary.
///
/// `Generic` covers commands without a dedicated payload shape and anything
/// the platform adds before this list learns about it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum MessageKind {
    Danmu,
    Gift,
    ComboSend,
    SuperChat,
    SuperChatJp,
    /// Legacy guard-purchase event, fired alongside [`MessageKind::UserToast`].
    GuardBuy,
    UserToast,
    InteractWord,
    InteractWordV2,
    EntryEffect,
    WatchedChange,
    OnlineRankCount,
    OnlineRankTop3,
    OnlineRankV2,
    OnlineRankV3,
    LikeUpdate,
    RoomBlock,
    Warning,
    RoomChange,
    Live,
    Preparing,
    NoticeMsg,
    SystemMsg,
    StopLiveRoomList,
    RoomRealTimeUpdate,
    LiveInteractiveGame,
    HotRankChanged,
    HotRankChangedV2,
    HotRoomNotify,
    WidgetBanner,
    WishBottle,
    Welcome,
    WelcomeGuard,
    VirtualMvp,
    LogInNotice,
    /// Room popularity from a heartbeat ack; not a command envelope.
    Popularity,
    Generic,
}

impl MessageKind {
    /// Maps a `cmd` value to its kind.
    ///
    /// The chat command family gets suffixed variants in the wild
    /// (`DANMU_MSG:4:0:2:2:2:0`), so it matches by prefix.
    pub fn classify(cmd: &str) -> Self {
        match cmd {
            "DANMU_MSG" => Self::Danmu,
            "SEND_GIFT" => Self::Gift,
            "COMBO_SEND" => Self::ComboSend,
            "SUPER_CHAT_MESSAGE" => Self::SuperChat,
            "SUPER_CHAT_MESSAGE_JP" => Self::SuperChatJp,
            "GUARD_BUY" => Self::GuardBuy,
            "USER_TOAST_MSG" => Self::UserToast,
            "INTERACT_WORD" => Self::InteractWord,
            "INTERACT_WORD_V2" => Self::InteractWordV2,
            "ENTRY_EFFECT" => Self::EntryEffect,
            "WATCHED_CHANGE" => Self::WatchedChange,
            "ONLINE_RANK_COUNT" => Self::OnlineRankCount,
            "ONLINE_RANK_TOP3" => Self::OnlineRankTop3,
            "ONLINE_RANK_V2" => Self::OnlineRankV2,
            "ONLINE_RANK_V3" => Self::OnlineRankV3,
            "LIKE_INFO_V3_UPDATE" => Self::LikeUpdate,
            "ROOM_BLOCK_MSG" => Self::RoomBlock,
            "WARNING" => Self::Warning,
            "ROOM_CHANGE" => Self::RoomChange,
            "LIVE" => Self::Live,
            "PREPARING" => Self::Preparing,
            "NOTICE_MSG" => Self::NoticeMsg,
            "SYS_MSG" => Self::SystemMsg,
            "STOP_LIVE_ROOM_LIST" => Self::StopLiveRoomList,
            "ROOM_REAL_TIME_MESSAGE_UPDATE" => Self::RoomRealTimeUpdate,
            "LIVE_INTERACTIVE_GAME" => Self::LiveInteractiveGame,
            "HOT_RANK_CHANGED" => Self::HotRankChanged,
            "HOT_RANK_CHANGED_V2" => Self::HotRankChangedV2,
            "HOT_ROOM_NOTIFY" => Self::HotRoomNotify,
            "WIDGET_BANNER" => Self::WidgetBanner,
            "WISH_BOTTLE" => Self::WishBottle,
            "WELCOME" => Self::Welcome,
            "WELCOME_GUARD" => Self::WelcomeGuard,
            "USER_VIRTUAL_MVP" => Self::VirtualMvp,
            "LOG_IN_NOTICE" => Self::LogInNotice,
            other if other.starts_with("DANMU_MSG") => Self::Danmu,
            _ => Self::Generic,
        }
    }
}

pub(crate) type Factory = fn(&CommandEnvelope) -> Result<MessagePayload, ClassificationError>;

/// Static mapping from kind to payload constructor. Kinds without a typed
/// shape fall through to the generic constructor.
pub(crate) fn factory(kind: MessageKind) -> Factory {
    match kind {
        MessageKind::Danmu => |env| Danmu::from_envelope(env).map(MessagePayload::Danmu),
        MessageKind::Gift => |env| Gift::from_envelope(env).map(MessagePayload::Gift),
        MessageKind::SuperChat | MessageKind::SuperChatJp => {
            |env| SuperChat::from_envelope(env).map(MessagePayload::SuperChat)
        }
        MessageKind::GuardBuy | MessageKind::UserToast => {
            |env| GuardBuy::from_envelope(env).map(MessagePayload::GuardBuy)
        }
        MessageKind::InteractWord => {
            |env| InteractWord::from_envelope(env).map(MessagePayload::InteractWord)
        }
        MessageKind::WatchedChange => {
            |env| WatchedChange::from_envelope(env).map(MessagePayload::WatchedChange)
        }
        MessageKind::OnlineRankCount => {
            |env| OnlineRankCount::from_envelope(env).map(MessagePayload::OnlineRankCount)
        }
        MessageKind::LikeUpdate => {
            |env| LikeUpdate::from_envelope(env).map(MessagePayload::LikeUpdate)
        }
        MessageKind::RoomBlock => {
            |env| RoomBlock::from_envelope(env).map(MessagePayload::RoomBlock)
        }
        MessageKind::Warning => |env| Warning::from_envelope(env).map(MessagePayload::Warning),
        MessageKind::RoomChange => {
            |env| RoomChange::from_envelope(env).map(MessagePayload::RoomChange)
        }
        MessageKind::VirtualMvp => {
            |env| VirtualMvp::from_envelope(env).map(MessagePayload::VirtualMvp)
        }
        _ => |_| Ok(MessagePayload::Generic),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn exact_commands_classify() {
        assert_eq!(MessageKind::classify("SEND_GIFT"), MessageKind::Gift);
        assert_eq!(MessageKind::classify("USER_TOAST_MSG"), MessageKind::UserToast);
        assert_eq!(MessageKind::classify("WARNING"), MessageKind::Warning);
        assert_eq!(
            MessageKind::classify("ONLINE_RANK_V3"),
            MessageKind::OnlineRankV3
        );
    }

    #[test]
    fn suffixed_chat_commands_classify_by_prefix() {
        assert_eq!(
            MessageKind::classify("DANMU_MSG:4:0:2:2:2:0"),
            MessageKind::Danmu
        );
        assert_eq!(MessageKind::classify("DANMU_MSG"), MessageKind::Danmu);
    }

    #[test]
    fn unknown_commands_are_generic() {
        assert_eq!(
            MessageKind::classify("TOTALLY_UNKNOWN"),
            MessageKind::Generic
        );
        // Prefix tolerance applies only to the chat family.
        assert_eq!(
            MessageKind::classify("SEND_GIFT_V9"),
            MessageKind::Generic
        );
    }

    #[test]
    fn generic_factory_never_fails() {
        let env = CommandEnvelope::parse(r#"{"cmd":"STOP_LIVE_ROOM_LIST"}"#).unwrap();
        let payload = factory(MessageKind::StopLiveRoomList)(&env).unwrap();
        assert_eq!(payload, MessagePayload::Generic);
    }

    #[test]
    fn typed_factory_surfaces_classification_error() {
        let env = CommandEnvelope::parse(r#"{"cmd":"SEND_GIFT","data":{}}"#).unwrap();
        assert!(factory(MessageKind::Gift)(&env).is_err());
    }
}
