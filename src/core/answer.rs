/// Answer predicates: does an utterance fit the expected answer kind, is it
/// a digression, and does a branch rule fire on the accepted value.

use crate::core::classify::normalize;
use crate::core::config::EngineConfig;
use crate::core::lexicon::Lexicon;
use crate::schema::act::AnswerKind;
use crate::schema::scene::{BranchTest, Step};

fn contains_any(list: &[String], text: &str) -> bool {
    list.iter().any(|p| !p.is_empty() && text.contains(p.as_str()))
}

const CLAUSE_BREAKS: &[char] = &['、', '。', ',', '！', '？', '!', '?', ' ', '　'];

/// A phrase that opens the utterance or one of its clauses. "てか" opens
/// "てか昨日ね" but not "終わってから".
fn opens_clause(list: &[String], text: &str) -> bool {
    text.split(CLAUSE_BREAKS)
        .map(str::trim_start)
        .any(|clause| list.iter().any(|p| !p.is_empty() && clause.starts_with(p.as_str())))
}

/// Exact phrase, or a phrase of two or more chars opening the answer
/// ("はい、眠れてる").
fn opens_with(list: &[String], norm: &str) -> bool {
    list.iter().any(|p| {
        !p.is_empty() && (norm == p || (p.chars().count() >= 2 && norm.starts_with(p.as_str())))
    })
}

fn is_bare_yes_no(norm: &str, lexicon: &Lexicon) -> bool {
    lexicon.acts.affirm.iter().any(|p| p == norm) || lexicon.acts.deny.iter().any(|p| p == norm)
}

fn is_question(text: &str) -> bool {
    let trimmed = text.trim_end();
    trimmed.ends_with('?') || trimmed.ends_with('？')
}

fn has_digit(text: &str) -> bool {
    text.chars()
        .any(|c| c.is_ascii_digit() || ('０'..='９').contains(&c))
}

pub fn is_negative(text: &str, lexicon: &Lexicon) -> bool {
    let norm = normalize(text);
    if norm.is_empty() {
        return false;
    }
    opens_with(&lexicon.acts.deny, &norm)
        || lexicon
            .cues
            .negative_endings
            .iter()
            .any(|e| !e.is_empty() && norm.ends_with(e.as_str()))
}

/// A negative ending overrides an affirmative opener: "うん、眠れてない"
/// answers "are you sleeping well?" with no.
pub fn is_affirmative(text: &str, lexicon: &Lexicon) -> bool {
    let norm = normalize(text);
    !norm.is_empty() && !is_negative(text, lexicon) && opens_with(&lexicon.acts.affirm, &norm)
}

/// Digression heuristic, checked before the kind predicate.
pub fn is_side_talk(text: &str, kind: AnswerKind, lexicon: &Lexicon, config: &EngineConfig) -> bool {
    let lowered = text.trim().to_lowercase();
    lowered.chars().count() > config.side_talk_min_chars
        || opens_clause(&lexicon.cues.side_talk_connectives, &lowered)
        || (kind.is_terse() && contains_any(&lexicon.cues.emotional_markers, &lowered))
}

/// The value to store if `text` satisfies the step's answer kind.
///
/// Choice steps store the matched choice label (or the lexicon's unsure
/// value); every other kind stores the trimmed utterance.
pub fn resolve_answer(
    step: &Step,
    text: &str,
    lexicon: &Lexicon,
    config: &EngineConfig,
) -> Option<String> {
    let raw = text.trim();
    let norm = normalize(raw);
    if norm.is_empty() {
        return None;
    }
    let cues = &lexicon.cues;

    let accepted = match step.kind {
        AnswerKind::Free => !is_bare_yes_no(&norm, lexicon) && !is_question(raw),
        AnswerKind::Time => contains_any(&cues.time_markers, &norm) || has_digit(&norm),
        AnswerKind::Place => contains_any(&cues.place_markers, &norm),
        AnswerKind::Item => {
            norm.chars().count() <= config.item_max_chars
                && !is_bare_yes_no(&norm, lexicon)
                && !is_question(raw)
        }
        AnswerKind::YesNo => is_affirmative(raw, lexicon) || is_negative(raw, lexicon),
        AnswerKind::Feeling => contains_any(&cues.feeling_markers, &norm),
        AnswerKind::Choice => return match_choice(step, &norm, lexicon),
    };

    accepted.then(|| raw.to_string())
}

fn match_choice(step: &Step, norm: &str, lexicon: &Lexicon) -> Option<String> {
    if let Some(choice) = step
        .choices
        .iter()
        .find(|c| norm.contains(c.to_lowercase().as_str()))
    {
        return Some(choice.clone());
    }
    let synonyms = &lexicon.cues.choice_synonyms;
    if let Some(choice) = step.choices.iter().find(|c| {
        synonyms
            .get(c.as_str())
            .is_some_and(|words| contains_any(words, norm))
    }) {
        return Some(choice.clone());
    }
    if contains_any(&lexicon.cues.unsure, norm) {
        return Some(lexicon.cues.unsure_value.clone());
    }
    None
}

pub fn branch_fires(test: &BranchTest, value: &str, lexicon: &Lexicon) -> bool {
    match test {
        BranchTest::ContainsAny(words) => {
            let lowered = value.to_lowercase();
            words
                .iter()
                .any(|w| !w.is_empty() && lowered.contains(w.to_lowercase().as_str()))
        }
        BranchTest::Yes => is_affirmative(value, lexicon),
        BranchTest::No => is_negative(value, lexicon),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn lexicon() -> Lexicon {
        Lexicon::builtin().unwrap()
    }

    fn step(kind: AnswerKind, choices: &[&str]) -> Step {
        Step {
            slot: "slot".to_string(),
            kind,
            prompts: vec!["？".to_string()],
            choices: choices.iter().map(|c| c.to_string()).collect(),
            branch: vec![],
        }
    }

    fn resolve(kind: AnswerKind, text: &str) -> Option<String> {
        resolve_answer(&step(kind, &[]), text, &lexicon(), &EngineConfig::default())
    }

    #[test]
    fn free_rejects_bare_yes_no_and_questions() {
        assert_eq!(resolve(AnswerKind::Free, "のんびりしたい"), Some("のんびりしたい".to_string()));
        assert_eq!(resolve(AnswerKind::Free, "うん"), None);
        assert_eq!(resolve(AnswerKind::Free, "なんで？"), None);
        assert_eq!(resolve(AnswerKind::Free, "   "), None);
    }

    #[test]
    fn time_needs_marker_or_digit() {
        assert!(resolve(AnswerKind::Time, "明日の朝").is_some());
        assert!(resolve(AnswerKind::Time, "３時").is_some());
        assert!(resolve(AnswerKind::Time, "10").is_some());
        assert!(resolve(AnswerKind::Time, "ねこ").is_none());
    }

    #[test]
    fn place_and_feeling_markers() {
        assert!(resolve(AnswerKind::Place, "近所の公園").is_some());
        assert!(resolve(AnswerKind::Place, "わからん").is_none());
        assert!(resolve(AnswerKind::Feeling, "けっこう楽しい").is_some());
        assert!(resolve(AnswerKind::Feeling, "ラーメン").is_none());
    }

    #[test]
    fn item_is_short_and_not_yes_no() {
        assert!(resolve(AnswerKind::Item, "ドラマ").is_some());
        assert!(resolve(AnswerKind::Item, "はい").is_none());
        let long = "あ".repeat(21);
        assert!(resolve(AnswerKind::Item, &long).is_none());
    }

    #[test]
    fn yes_no_with_negative_endings() {
        let lex = lexicon();
        assert!(is_affirmative("はい", &lex));
        assert!(is_affirmative("うん、眠れてる", &lex));
        assert!(is_negative("いいえ", &lex));
        assert!(is_negative("あんまり眠れてない", &lex));
        assert!(!is_affirmative("うん、眠れてない", &lex));
        assert!(resolve(AnswerKind::YesNo, "ねこ").is_none());
    }

    #[test]
    fn choice_by_label_synonym_or_unsure() {
        let lex = lexicon();
        let config = EngineConfig::default();
        let s = step(AnswerKind::Choice, &["のんびり", "アクティブ", "半々"]);
        assert_eq!(resolve_answer(&s, "のんびりかな", &lex, &config), Some("のんびり".to_string()));
        assert_eq!(resolve_answer(&s, "まったりしたい", &lex, &config), Some("のんびり".to_string()));
        assert_eq!(resolve_answer(&s, "外で遊びたい", &lex, &config), Some("アクティブ".to_string()));
        assert_eq!(resolve_answer(&s, "わからない", &lex, &config), Some("未定".to_string()));
        assert_eq!(resolve_answer(&s, "ラーメン", &lex, &config), None);
    }

    #[test]
    fn side_talk_signals() {
        let lex = lexicon();
        let config = EngineConfig::default();
        assert!(is_side_talk("そういえば昨日ね", AnswerKind::Free, &lex, &config));
        assert!(is_side_talk("もう最悪！！", AnswerKind::Time, &lex, &config));
        assert!(!is_side_talk("もう最悪！！", AnswerKind::Feeling, &lex, &config));
        let long = "今日は".repeat(14);
        assert!(is_side_talk(&long, AnswerKind::Feeling, &lex, &config));
        assert!(!is_side_talk("明日の朝", AnswerKind::Time, &lex, &config));
    }

    #[test]
    fn connectives_only_count_at_clause_start() {
        let lex = lexicon();
        let config = EngineConfig::default();
        assert!(is_side_talk("てか昨日ね", AnswerKind::Time, &lex, &config));
        assert!(is_side_talk("うーん、ちなみに猫がね", AnswerKind::Free, &lex, &config));
        assert!(!is_side_talk("仕事が終わってから", AnswerKind::Time, &lex, &config));
        assert_eq!(
            resolve(AnswerKind::Time, "仕事が終わってから"),
            Some("仕事が終わってから".to_string())
        );
    }

    #[test]
    fn branch_tests() {
        let lex = lexicon();
        let test = BranchTest::ContainsAny(vec!["旅行".to_string()]);
        assert!(branch_fires(&test, "旅行に行きたい", &lex));
        assert!(!branch_fires(&test, "家でのんびり", &lex));
        assert!(branch_fires(&BranchTest::No, "いいえ", &lex));
        assert!(branch_fires(&BranchTest::Yes, "はい", &lex));
        assert!(!branch_fires(&BranchTest::Yes, "いいえ", &lex));
    }
}
