use serde_json::Value;

use joey_core::quests::QuestEvent;

/// One inbound Slack event, reduced to what the orchestration layer
/// needs. Anything the bot itself produced is filtered out at parse
/// time; the bot never reacts to its own traffic.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum InboundEvent {
    /// `@Joey …` in a channel.
    Mention { user_id: String, channel_id: String, text: String, thread_ts: Option<String>, ts: String },
    /// A DM to the bot; handled exactly like a mention.
    DirectMessage { user_id: String, channel_id: String, text: String, thread_ts: Option<String>, ts: String },
    /// Ordinary channel message; feeds the quest tracker only.
    Message { user_id: String, channel_id: String, text: String, thread_ts: Option<String>, ts: String },
    ReactionAdded { user_id: String, channel_id: String, emoji: String, item_ts: String },
    Unsupported { event_type: String },
}

fn str_field<'a>(value: &'a Value, key: &str) -> Option<&'a str> {
    value.get(key).and_then(Value::as_str)
}

/// Parse the `event` object of an Events API callback. Returns `None`
/// for bot-generated messages and message subtypes (edits, joins, …).
pub fn parse_event(event: &Value) -> Option<InboundEvent> {
    let event_type = str_field(event, "type")?;

    match event_type {
        "app_mention" => Some(InboundEvent::Mention {
            user_id: str_field(event, "user")?.to_owned(),
            channel_id: str_field(event, "channel")?.to_owned(),
            text: str_field(event, "text").unwrap_or_default().to_owned(),
            thread_ts: str_field(event, "thread_ts").map(str::to_owned),
            ts: str_field(event, "ts").unwrap_or_default().to_owned(),
        }),
        "message" => {
            if event.get("bot_id").is_some() || event.get("subtype").is_some() {
                return None;
            }
            let user_id = str_field(event, "user")?.to_owned();
            let channel_id = str_field(event, "channel")?.to_owned();
            let text = str_field(event, "text").unwrap_or_default().to_owned();
            let thread_ts = str_field(event, "thread_ts").map(str::to_owned);
            let ts = str_field(event, "ts").unwrap_or_default().to_owned();

            if str_field(event, "channel_type") == Some("im") {
                Some(InboundEvent::DirectMessage { user_id, channel_id, text, thread_ts, ts })
            } else {
                Some(InboundEvent::Message { user_id, channel_id, text, thread_ts, ts })
            }
        }
        "reaction_added" => {
            let item = event.get("item")?;
            Some(InboundEvent::ReactionAdded {
                user_id: str_field(event, "user")?.to_owned(),
                channel_id: str_field(item, "channel")?.to_owned(),
                emoji: str_field(event, "reaction")?.to_owned(),
                item_ts: str_field(item, "ts").unwrap_or_default().to_owned(),
            })
        }
        other => Some(InboundEvent::Unsupported { event_type: other.to_owned() }),
    }
}

impl InboundEvent {
    /// Slack timestamps are `"<unix-seconds>.<sequence>"`.
    fn ts_seconds(ts: &str) -> Option<i64> {
        ts.split('.').next()?.parse().ok()
    }

    /// Reduce to the quest vocabulary. Mentions and DMs don't feed
    /// quests; channel names and local hour are resolved by the caller
    /// so rule evaluation stays pure.
    pub fn to_quest_event(
        &self,
        channel_name: Option<String>,
        local_hour_of: impl Fn(i64) -> Option<u8>,
    ) -> Option<QuestEvent> {
        match self {
            Self::Message { user_id, channel_id, text, thread_ts, ts } => {
                let is_thread_reply =
                    matches!(thread_ts, Some(parent) if parent != ts);
                Some(QuestEvent::Message {
                    user_id: user_id.clone(),
                    channel_id: channel_id.clone(),
                    channel_name,
                    text: text.clone(),
                    is_thread_reply,
                    hour_of_day: Self::ts_seconds(ts).and_then(local_hour_of),
                })
            }
            Self::ReactionAdded { user_id, channel_id, emoji, .. } => {
                Some(QuestEvent::Reaction {
                    user_id: user_id.clone(),
                    channel_id: channel_id.clone(),
                    channel_name,
                    emoji: emoji.clone(),
                })
            }
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use joey_core::quests::QuestEvent;

    use super::{parse_event, InboundEvent};

    #[test]
    fn parses_app_mentions() {
        let event = json!({
            "type": "app_mention",
            "user": "U1",
            "channel": "C1",
            "text": "<@BOT1> points",
            "ts": "1730000000.1000"
        });
        let parsed = parse_event(&event).expect("parsed");
        assert!(matches!(parsed, InboundEvent::Mention { ref user_id, .. } if user_id == "U1"));
    }

    #[test]
    fn bot_messages_and_subtypes_are_dropped() {
        let bot_message = json!({
            "type": "message", "user": "U1", "channel": "C1",
            "text": "hi", "ts": "1.0", "bot_id": "B1"
        });
        assert_eq!(parse_event(&bot_message), None);

        let edit = json!({
            "type": "message", "user": "U1", "channel": "C1",
            "text": "hi", "ts": "1.0", "subtype": "message_changed"
        });
        assert_eq!(parse_event(&edit), None);
    }

    #[test]
    fn dm_is_distinguished_by_channel_type() {
        let dm = json!({
            "type": "message", "user": "U1", "channel": "D1",
            "text": "hello", "ts": "1.0", "channel_type": "im"
        });
        assert!(matches!(parse_event(&dm), Some(InboundEvent::DirectMessage { .. })));
    }

    #[test]
    fn reaction_carries_the_item_channel() {
        let reaction = json!({
            "type": "reaction_added",
            "user": "U1",
            "reaction": "kangaroo",
            "item": {"channel": "C9", "ts": "1730000000.2000"}
        });
        let parsed = parse_event(&reaction).expect("parsed");
        assert!(matches!(
            parsed,
            InboundEvent::ReactionAdded { ref channel_id, ref emoji, .. }
                if channel_id == "C9" && emoji == "kangaroo"
        ));
    }

    #[test]
    fn thread_reply_detection_compares_parent_and_own_ts() {
        let reply = InboundEvent::Message {
            user_id: "U1".to_owned(),
            channel_id: "C1".to_owned(),
            text: "replying".to_owned(),
            thread_ts: Some("1730000000.1000".to_owned()),
            ts: "1730000001.5000".to_owned(),
        };
        let quest_event = reply.to_quest_event(None, |_| Some(14)).expect("quest event");
        assert!(matches!(
            quest_event,
            QuestEvent::Message { is_thread_reply: true, .. }
        ));

        let parent = InboundEvent::Message {
            user_id: "U1".to_owned(),
            channel_id: "C1".to_owned(),
            text: "starting a thread".to_owned(),
            thread_ts: Some("1730000000.1000".to_owned()),
            ts: "1730000000.1000".to_owned(),
        };
        let quest_event = parent.to_quest_event(None, |_| Some(14)).expect("quest event");
        assert!(matches!(
            quest_event,
            QuestEvent::Message { is_thread_reply: false, .. }
        ));
    }

    #[test]
    fn local_hour_is_derived_from_the_message_timestamp() {
        let message = InboundEvent::Message {
            user_id: "U1".to_owned(),
            channel_id: "C1".to_owned(),
            text: "late night".to_owned(),
            thread_ts: None,
            ts: "1730000000.1000".to_owned(),
        };
        let quest_event = message
            .to_quest_event(None, |seconds| {
                assert_eq!(seconds, 1_730_000_000);
                Some(3)
            })
            .expect("quest event");
        assert!(matches!(quest_event, QuestEvent::Message { hour_of_day: Some(3), .. }));
    }

    #[test]
    fn mentions_do_not_feed_quests() {
        let mention = InboundEvent::Mention {
            user_id: "U1".to_owned(),
            channel_id: "C1".to_owned(),
            text: "<@BOT1> points".to_owned(),
            thread_ts: None,
            ts: "1.0".to_owned(),
        };
        assert!(mention.to_quest_event(None, |_| None).is_none());
    }
}
