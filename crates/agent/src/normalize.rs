use once_cell::sync::Lazy;
use regex::Regex;

static MENTION: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"<@([A-Z0-9]+)(?:\|[^>]*)?>").expect("mention pattern"));
static BARE_MENTION: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"@([A-Za-z0-9._-]+)").expect("bare mention pattern"));

/// Tokens that look like mention targets but never are: prepositions that
/// follow "award ... @" phrasing, and domain words users prefix with `@`
/// out of habit.
const MENTION_STOP_WORDS: &[&str] = &[
    "for", "to", "the", "a", "an", "of", "in", "on", "with", "points", "point", "pts", "task",
    "tasks", "reward", "rewards", "here", "channel", "everyone", "joey",
];

/// Strip only the bot's own mention, preserving everyone else's, then
/// collapse whitespace. Other mentions carry meaning (award targets).
pub fn clean_mention(text: &str, bot_user_id: &str) -> String {
    let cleaned = MENTION.replace_all(text, |caps: &regex::Captures<'_>| {
        if &caps[1] == bot_user_id {
            String::new()
        } else {
            caps[0].to_owned()
        }
    });
    collapse_whitespace(&cleaned)
}

pub fn collapse_whitespace(text: &str) -> String {
    text.split_whitespace().collect::<Vec<_>>().join(" ")
}

/// Normalize a user reference to a bare ID: `<@U1>`, `<@U1|nick>`, and
/// `@U1` all become `U1`.
pub fn clean_user_id(reference: &str) -> String {
    let trimmed = reference.trim();
    if let Some(caps) = MENTION.captures(trimmed) {
        return caps[1].to_owned();
    }
    trimmed.strip_prefix('@').unwrap_or(trimmed).to_owned()
}

/// All plausible mention targets in a message, bot excluded, stop-word
/// false positives dropped. Proper `<@U…>` tokens are trusted as-is; bare
/// `@word` tokens are kept only when they survive the stop-word filter.
pub fn extract_mention_targets(text: &str, bot_user_id: &str) -> Vec<String> {
    let mut targets = Vec::new();

    for caps in MENTION.captures_iter(text) {
        let id = caps[1].to_owned();
        if id != bot_user_id && !targets.contains(&id) {
            targets.push(id);
        }
    }

    // Bare @name tokens only matter when no real mention matched the span;
    // strip proper mentions first so their IDs aren't double-counted.
    let without_proper = MENTION.replace_all(text, " ");
    for caps in BARE_MENTION.captures_iter(&without_proper) {
        let token = caps[1].to_owned();
        let lowered = token.to_ascii_lowercase();
        if MENTION_STOP_WORDS.contains(&lowered.as_str()) {
            continue;
        }
        if token != bot_user_id && !targets.contains(&token) {
            targets.push(token);
        }
    }

    targets
}

#[cfg(test)]
mod tests {
    use super::{clean_mention, clean_user_id, extract_mention_targets};

    #[test]
    fn strips_only_the_bots_mention() {
        let cleaned = clean_mention("<@BOT1> award <@U2> 10 points", "BOT1");
        assert_eq!(cleaned, "award <@U2> 10 points");
    }

    #[test]
    fn strips_bot_mention_anywhere_in_message() {
        let cleaned = clean_mention("hey <@BOT1|joey> , points please <@BOT1>", "BOT1");
        assert_eq!(cleaned, "hey , points please");
    }

    #[test]
    fn collapses_internal_whitespace() {
        assert_eq!(clean_mention("  points   \n balance ", "BOT1"), "points balance");
    }

    #[test]
    fn user_id_normalization_handles_all_reference_forms() {
        assert_eq!(clean_user_id("<@U123>"), "U123");
        assert_eq!(clean_user_id("<@U123|sam>"), "U123");
        assert_eq!(clean_user_id("@U123"), "U123");
        assert_eq!(clean_user_id("U123"), "U123");
    }

    #[test]
    fn mention_targets_exclude_bot_and_stop_words() {
        let targets = extract_mention_targets("<@BOT1> award @for <@U2> and @sam for points", "BOT1");
        assert_eq!(targets, vec!["U2".to_owned(), "sam".to_owned()]);
    }

    #[test]
    fn mention_targets_deduplicate() {
        let targets = extract_mention_targets("award <@U2> <@U2> 5 points", "BOT1");
        assert_eq!(targets, vec!["U2".to_owned()]);
    }

    #[test]
    fn no_targets_in_plain_text() {
        assert!(extract_mention_targets("award 10 points for the newsletter", "BOT1").is_empty());
    }
}
