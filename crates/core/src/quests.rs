use serde::{Deserialize, Serialize};

/// What makes an inbound event count toward a quest. Evaluation is
/// independent per quest: one event may qualify several quests in the
/// same pass, contributing at most 1 to each.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case", tag = "kind")]
pub enum MatchRule {
    AnyReaction,
    ThreadReply,
    TextPattern { pattern: String },
    InChannel { channel: String },
    FirstPostInChannel { channel: String },
    ReactionInChannel { channel: String },
    EmojiSet { emojis: Vec<String> },
    TimeWindow { start_hour: u8, end_hour: u8 },
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct QuestDefinition {
    pub id: String,
    pub name: String,
    pub points: i64,
    pub target_count: u32,
    pub rule: MatchRule,
}

/// Chat activity reduced to the fields quest rules care about. The event
/// normalizer resolves channel names and computes the local hour so rule
/// evaluation stays pure.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum QuestEvent {
    Message {
        user_id: String,
        channel_id: String,
        channel_name: Option<String>,
        text: String,
        is_thread_reply: bool,
        hour_of_day: Option<u8>,
    },
    Reaction {
        user_id: String,
        channel_id: String,
        channel_name: Option<String>,
        emoji: String,
    },
}

impl QuestEvent {
    pub fn user_id(&self) -> &str {
        match self {
            Self::Message { user_id, .. } | Self::Reaction { user_id, .. } => user_id,
        }
    }

    pub fn channel_id(&self) -> &str {
        match self {
            Self::Message { channel_id, .. } | Self::Reaction { channel_id, .. } => channel_id,
        }
    }
}

fn normalize_emoji(emoji: &str) -> String {
    emoji.trim().trim_matches(':').to_ascii_lowercase()
}

impl MatchRule {
    pub fn matches(&self, event: &QuestEvent) -> bool {
        match (self, event) {
            (Self::AnyReaction, QuestEvent::Reaction { .. }) => true,
            (Self::ThreadReply, QuestEvent::Message { is_thread_reply, .. }) => *is_thread_reply,
            (Self::TextPattern { pattern }, QuestEvent::Message { text, .. }) => {
                text.to_ascii_lowercase().contains(&pattern.to_ascii_lowercase())
            }
            // Channel quests count top-level posts only; thread chatter in
            // a showcase channel is not a showcase.
            (
                Self::InChannel { channel } | Self::FirstPostInChannel { channel },
                QuestEvent::Message { channel_name, is_thread_reply, .. },
            ) => !is_thread_reply && channel_name.as_deref() == Some(channel.as_str()),
            (
                Self::ReactionInChannel { channel },
                QuestEvent::Reaction { channel_name, .. },
            ) => channel_name.as_deref() == Some(channel.as_str()),
            (Self::EmojiSet { emojis }, QuestEvent::Reaction { emoji, .. }) => {
                let wanted = normalize_emoji(emoji);
                emojis.iter().any(|candidate| normalize_emoji(candidate) == wanted)
            }
            (
                Self::TimeWindow { start_hour, end_hour },
                QuestEvent::Message { hour_of_day: Some(hour), .. },
            ) => *hour >= *start_hour && *hour < *end_hour,
            _ => false,
        }
    }

    /// First-post quests need an external has-posted check on top of the
    /// plain rule match.
    pub fn first_post_channel(&self) -> Option<&str> {
        match self {
            Self::FirstPostInChannel { channel } => Some(channel),
            _ => None,
        }
    }
}

fn quest(id: &str, name: &str, points: i64, target_count: u32, rule: MatchRule) -> QuestDefinition {
    QuestDefinition { id: id.to_owned(), name: name.to_owned(), points, target_count, rule }
}

/// The static engagement catalog.
pub fn default_quests() -> Vec<QuestDefinition> {
    vec![
        quest("connector", "Connector", 5, 5, MatchRule::AnyReaction),
        quest("helper", "Helper", 5, 3, MatchRule::ThreadReply),
        quest(
            "first-contact",
            "First Contact",
            2,
            1,
            MatchRule::FirstPostInChannel { channel: "_start-here".to_owned() },
        ),
        quest("paper-trail", "Paper Trail", 5, 1, MatchRule::TextPattern {
            pattern: "arxiv.org".to_owned(),
        }),
        quest("git-pusher", "Git Pusher", 5, 1, MatchRule::TextPattern {
            pattern: "github.com".to_owned(),
        }),
        quest("model-citizen", "Model Citizen", 5, 1, MatchRule::TextPattern {
            pattern: "huggingface.co".to_owned(),
        }),
        quest("code-blooded", "Code Blooded", 2, 1, MatchRule::TextPattern {
            pattern: "```".to_owned(),
        }),
        quest("show-off", "Show Off", 10, 1, MatchRule::InChannel {
            channel: "showcase".to_owned(),
        }),
        quest("bug-basher", "Bug Basher", 10, 1, MatchRule::InChannel {
            channel: "bugs".to_owned(),
        }),
        quest("melb-coffee", "Melb Coffee", 1, 1, MatchRule::EmojiSet {
            emojis: vec!["coffee".to_owned(), "flat_white".to_owned(), "espresso".to_owned()],
        }),
        quest("kangaroo-court", "Kangaroo Court", 1, 1, MatchRule::EmojiSet {
            emojis: vec!["kangaroo".to_owned()],
        }),
        quest(
            "warm-welcome",
            "Warm Welcome",
            5,
            1,
            MatchRule::ReactionInChannel { channel: "_start-here".to_owned() },
        ),
        quest("night-owl", "Night Owl", 10, 1, MatchRule::TimeWindow {
            start_hour: 1,
            end_hour: 5,
        }),
    ]
}

#[cfg(test)]
mod tests {
    use super::{default_quests, MatchRule, QuestEvent};

    fn message(text: &str, channel_name: Option<&str>, is_thread_reply: bool) -> QuestEvent {
        QuestEvent::Message {
            user_id: "U1".to_owned(),
            channel_id: "C1".to_owned(),
            channel_name: channel_name.map(str::to_owned),
            text: text.to_owned(),
            is_thread_reply,
            hour_of_day: Some(14),
        }
    }

    fn reaction(emoji: &str, channel_name: Option<&str>) -> QuestEvent {
        QuestEvent::Reaction {
            user_id: "U1".to_owned(),
            channel_id: "C1".to_owned(),
            channel_name: channel_name.map(str::to_owned),
            emoji: emoji.to_owned(),
        }
    }

    #[test]
    fn one_reaction_can_qualify_general_and_emoji_quests() {
        let event = reaction("coffee", Some("random"));
        let matching: Vec<_> = default_quests()
            .into_iter()
            .filter(|quest| quest.rule.matches(&event))
            .map(|quest| quest.id)
            .collect();
        assert!(matching.contains(&"connector".to_owned()));
        assert!(matching.contains(&"melb-coffee".to_owned()));
        assert!(!matching.contains(&"kangaroo-court".to_owned()));
    }

    #[test]
    fn text_pattern_is_case_insensitive() {
        let rule = MatchRule::TextPattern { pattern: "github.com".to_owned() };
        assert!(rule.matches(&message("check HTTPS://GITHUB.COM/org/repo", None, false)));
        assert!(!rule.matches(&message("no links here", None, false)));
    }

    #[test]
    fn channel_quests_ignore_thread_replies() {
        let rule = MatchRule::InChannel { channel: "showcase".to_owned() };
        assert!(rule.matches(&message("my demo", Some("showcase"), false)));
        assert!(!rule.matches(&message("my demo", Some("showcase"), true)));
        assert!(!rule.matches(&message("my demo", Some("general"), false)));
    }

    #[test]
    fn emoji_set_tolerates_colon_wrapping_and_case() {
        let rule = MatchRule::EmojiSet { emojis: vec!["kangaroo".to_owned()] };
        assert!(rule.matches(&reaction(":KANGAROO:", None)));
        assert!(!rule.matches(&reaction("koala", None)));
    }

    #[test]
    fn time_window_is_half_open() {
        let rule = MatchRule::TimeWindow { start_hour: 1, end_hour: 5 };
        let at = |hour: u8| QuestEvent::Message {
            user_id: "U1".to_owned(),
            channel_id: "C1".to_owned(),
            channel_name: None,
            text: "late night hacking".to_owned(),
            is_thread_reply: false,
            hour_of_day: Some(hour),
        };
        assert!(rule.matches(&at(1)));
        assert!(rule.matches(&at(4)));
        assert!(!rule.matches(&at(5)));
        assert!(!rule.matches(&at(23)));
    }

    #[test]
    fn thread_reply_rule_requires_thread_context() {
        let rule = MatchRule::ThreadReply;
        assert!(rule.matches(&message("replying", None, true)));
        assert!(!rule.matches(&message("top level", None, false)));
    }
}
