/// Speech-act classification and intent/tone inference. Pure functions over
/// the lexicon and catalog tables.

use crate::core::catalog::SceneCatalog;
use crate::core::config::EngineConfig;
use crate::core::lexicon::Lexicon;
use crate::schema::act::{Act, ClosingStyle, Intent, Tone, Topic};

const TRAILING_PUNCT: &[char] = &[
    '。', '、', '！', '？', '!', '?', '.', ',', '〜', '～', '…', '♪', ' ', '　',
];

/// Trim, lowercase, and drop trailing punctuation so "うん！" and "うん"
/// classify alike.
pub fn normalize(text: &str) -> String {
    text.trim()
        .to_lowercase()
        .trim_end_matches(TRAILING_PUNCT)
        .to_string()
}

fn exact(list: &[String], text: &str) -> bool {
    list.iter().any(|p| p == text)
}

fn contains_any(list: &[String], text: &str) -> bool {
    list.iter().any(|p| !p.is_empty() && text.contains(p.as_str()))
}

/// Classify one non-empty utterance. First match wins.
pub fn classify(text: &str, lexicon: &Lexicon, catalog: &SceneCatalog, config: &EngineConfig) -> Act {
    let norm = normalize(text);
    let acts = &lexicon.acts;

    if exact(&acts.greet, &norm) {
        return Act::Greet;
    }
    if exact(&acts.thanks, &norm) {
        return Act::Thanks;
    }
    if exact(&acts.apology, &norm) {
        return Act::Apology;
    }
    if exact(&acts.bye, &norm) {
        return Act::Bye;
    }
    if contains_any(&acts.topic_switch, &norm) {
        return Act::TopicSwitch;
    }
    if exact(&acts.confused, &norm) || contains_any(&acts.confusion_markers, &norm) {
        return Act::Confused;
    }
    if exact(&acts.deny, &norm) {
        return Act::Deny;
    }
    if exact(&acts.affirm, &norm) {
        return Act::Affirm;
    }
    if norm.chars().count() <= config.topic_select_max_chars && catalog.match_topic(&norm).is_some()
    {
        return Act::TopicSelect;
    }
    Act::Free
}

/// Decision-seeking phrasing wins over distress; anything else is chat.
pub fn infer_intent(text: &str, lexicon: &Lexicon) -> Intent {
    let norm = normalize(text);
    if contains_any(&lexicon.cues.decide, &norm) {
        Intent::Decide
    } else if contains_any(&lexicon.cues.distress, &norm) {
        Intent::Comfort
    } else {
        Intent::Chat
    }
}

pub fn has_distress(text: &str, lexicon: &Lexicon) -> bool {
    contains_any(&lexicon.cues.distress, &normalize(text))
}

pub fn infer_tone(topic: Option<Topic>, distress: bool) -> Tone {
    if distress {
        return Tone::Warm;
    }
    match topic {
        Some(Topic::Body) => Tone::Warm,
        Some(Topic::Social) | Some(Topic::Choice) => Tone::Calm,
        Some(Topic::Hobby) => Tone::Hype,
        Some(Topic::Plan) | None => Tone::Light,
    }
}

pub fn closing_style(intent: Intent, topic: Option<Topic>) -> ClosingStyle {
    match (intent, topic) {
        (Intent::Comfort, _) => ClosingStyle::Soft,
        (Intent::Decide, _) => ClosingStyle::Forward,
        (Intent::Chat, Some(Topic::Body) | Some(Topic::Social)) => ClosingStyle::Soft,
        (Intent::Chat, Some(Topic::Choice) | Some(Topic::Plan)) => ClosingStyle::Forward,
        (Intent::Chat, Some(Topic::Hobby)) => ClosingStyle::Playful,
        (Intent::Chat, None) => ClosingStyle::Forward,
    }
}
