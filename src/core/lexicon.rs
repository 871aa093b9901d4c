/// Lexicon: keyword tables for act classification and answer matching, plus
/// every phrase pool the renderer samples from.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::Path;
use thiserror::Error;

use crate::schema::act::{AnswerKind, ClosingStyle, Tone};

const BUILTIN_LEXICON: &str = include_str!("../../dialogue_data/ja/lexicon.ron");

/// Characters that end a spoken sentence. Bubbles must not end with one so
/// they can never be mistaken for, or equal to, rendered text.
pub const TERMINATORS: &[char] = &['。', '！', '？', '!', '?', '…', '♪', '～'];

#[derive(Debug, Error)]
pub enum LexiconError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("RON deserialization error: {0}")]
    Ron(#[from] ron::error::SpannedError),
    #[error("invalid lexicon: {}", .0.join("; "))]
    Invalid(Vec<String>),
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Lexicon {
    pub version: u32,
    pub acts: ActPhrases,
    pub cues: Cues,
    pub pools: PhrasePools,
}

/// Phrase sets matched by the act classifier.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ActPhrases {
    pub greet: Vec<String>,
    pub thanks: Vec<String>,
    pub apology: Vec<String>,
    pub bye: Vec<String>,
    pub confused: Vec<String>,
    /// Substrings that mark an utterance as confused even when it is longer
    /// than any exact phrase.
    pub confusion_markers: Vec<String>,
    pub deny: Vec<String>,
    pub affirm: Vec<String>,
    pub topic_switch: Vec<String>,
}

/// Cue words for intent, side-talk detection, and answer-kind predicates.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Cues {
    pub decide: Vec<String>,
    pub distress: Vec<String>,
    pub side_talk_connectives: Vec<String>,
    pub emotional_markers: Vec<String>,
    pub time_markers: Vec<String>,
    pub place_markers: Vec<String>,
    pub feeling_markers: Vec<String>,
    pub unsure: Vec<String>,
    /// Endings that turn an answer into a "no" ("眠れてない").
    #[serde(default)]
    pub negative_endings: Vec<String>,
    /// Value stored for a choice step when the user says they don't know.
    pub unsure_value: String,
    /// Choice label → alternative wordings that select it.
    #[serde(default)]
    pub choice_synonyms: HashMap<String, Vec<String>>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TonePools {
    pub light: Vec<String>,
    pub warm: Vec<String>,
    pub hype: Vec<String>,
    pub calm: Vec<String>,
}

impl TonePools {
    pub fn get(&self, tone: Tone) -> &[String] {
        match tone {
            Tone::Light => &self.light,
            Tone::Warm => &self.warm,
            Tone::Hype => &self.hype,
            Tone::Calm => &self.calm,
        }
    }
}

/// One pool per answer kind.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct KindPools {
    pub free: Vec<String>,
    pub time: Vec<String>,
    pub place: Vec<String>,
    pub item: Vec<String>,
    pub yesno: Vec<String>,
    pub feeling: Vec<String>,
    pub choice: Vec<String>,
}

impl KindPools {
    pub fn get(&self, kind: AnswerKind) -> &[String] {
        match kind {
            AnswerKind::Free => &self.free,
            AnswerKind::Time => &self.time,
            AnswerKind::Place => &self.place,
            AnswerKind::Item => &self.item,
            AnswerKind::YesNo => &self.yesno,
            AnswerKind::Feeling => &self.feeling,
            AnswerKind::Choice => &self.choice,
        }
    }

    fn entries(&self) -> [(&'static str, &Vec<String>); 7] {
        [
            ("free", &self.free),
            ("time", &self.time),
            ("place", &self.place),
            ("item", &self.item),
            ("yesno", &self.yesno),
            ("feeling", &self.feeling),
            ("choice", &self.choice),
        ]
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ClosingPools {
    pub soft: Vec<String>,
    pub forward: Vec<String>,
    pub playful: Vec<String>,
}

impl ClosingPools {
    pub fn get(&self, style: ClosingStyle) -> &[String] {
        match style {
            ClosingStyle::Soft => &self.soft,
            ClosingStyle::Forward => &self.forward,
            ClosingStyle::Playful => &self.playful,
        }
    }
}

/// Every phrase pool the engine speaks from.
///
/// Placeholders: `{mascot}` in `greeting_mascot`, `{value}` in `confirm`
/// and `recall`, `{name}` in `name_call`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PhrasePools {
    pub greeting: Vec<String>,
    pub greeting_mascot: Vec<String>,
    pub listening: Vec<String>,
    pub greet_back: Vec<String>,
    pub thanks_reply: Vec<String>,
    pub apology_reply: Vec<String>,
    pub bye_reply: Vec<String>,
    pub ack: TonePools,
    pub work_ack: Vec<String>,
    pub filler: Vec<String>,
    pub confused_lead: Vec<String>,
    pub deny_lead: Vec<String>,
    pub digression_ack: Vec<String>,
    pub giveup_ack: Vec<String>,
    pub retry: KindPools,
    pub simple: KindPools,
    pub menu: Vec<String>,
    pub work_menu: Vec<String>,
    pub closing: ClosingPools,
    pub continue_prompt: Vec<String>,
    pub work_continue: Vec<String>,
    pub softener: Vec<String>,
    /// Echo of a short accepted answer. Empty means a plain tone ack.
    #[serde(default)]
    pub confirm: Vec<String>,
    pub recall: Vec<String>,
    pub switch_ack: Vec<String>,
    pub mode_chat: Vec<String>,
    pub mode_work: Vec<String>,
    pub name_call: Vec<String>,
    pub bubble_ack: Vec<String>,
    pub bubble_react: Vec<String>,
}

impl PhrasePools {
    fn flat(&self) -> Vec<(String, &Vec<String>)> {
        let mut out: Vec<(String, &Vec<String>)> = [
            ("greeting", &self.greeting),
            ("greeting_mascot", &self.greeting_mascot),
            ("listening", &self.listening),
            ("greet_back", &self.greet_back),
            ("thanks_reply", &self.thanks_reply),
            ("apology_reply", &self.apology_reply),
            ("bye_reply", &self.bye_reply),
            ("ack.light", &self.ack.light),
            ("ack.warm", &self.ack.warm),
            ("ack.hype", &self.ack.hype),
            ("ack.calm", &self.ack.calm),
            ("work_ack", &self.work_ack),
            ("filler", &self.filler),
            ("confused_lead", &self.confused_lead),
            ("deny_lead", &self.deny_lead),
            ("digression_ack", &self.digression_ack),
            ("giveup_ack", &self.giveup_ack),
            ("menu", &self.menu),
            ("work_menu", &self.work_menu),
            ("closing.soft", &self.closing.soft),
            ("closing.forward", &self.closing.forward),
            ("closing.playful", &self.closing.playful),
            ("continue_prompt", &self.continue_prompt),
            ("work_continue", &self.work_continue),
            ("softener", &self.softener),
            ("recall", &self.recall),
            ("switch_ack", &self.switch_ack),
            ("mode_chat", &self.mode_chat),
            ("mode_work", &self.mode_work),
            ("name_call", &self.name_call),
            ("bubble_ack", &self.bubble_ack),
            ("bubble_react", &self.bubble_react),
        ]
        .into_iter()
        .map(|(family, pool)| (family.to_string(), pool))
        .collect();
        for (kind, pool) in self.retry.entries() {
            out.push((format!("retry.{kind}"), pool));
        }
        for (kind, pool) in self.simple.entries() {
            out.push((format!("simple.{kind}"), pool));
        }
        out
    }
}

impl Lexicon {
    /// The Japanese lexicon shipped with the crate.
    pub fn builtin() -> Result<Lexicon, LexiconError> {
        Self::parse_ron(BUILTIN_LEXICON)
    }

    /// Load a lexicon from a RON file.
    pub fn load_from_ron(path: &Path) -> Result<Lexicon, LexiconError> {
        let contents = std::fs::read_to_string(path)?;
        Self::parse_ron(&contents)
    }

    /// Parse a lexicon from a RON string. Matching keywords are lowercased
    /// so they compare against normalized input.
    pub fn parse_ron(input: &str) -> Result<Lexicon, LexiconError> {
        let mut lexicon: Lexicon = ron::from_str(input)?;
        lexicon.lowercase_keywords();
        Ok(lexicon)
    }

    fn lowercase_keywords(&mut self) {
        let acts = &mut self.acts;
        for list in [
            &mut acts.greet,
            &mut acts.thanks,
            &mut acts.apology,
            &mut acts.bye,
            &mut acts.confused,
            &mut acts.confusion_markers,
            &mut acts.deny,
            &mut acts.affirm,
            &mut acts.topic_switch,
        ] {
            lowercase_all(list);
        }
        let cues = &mut self.cues;
        for list in [
            &mut cues.decide,
            &mut cues.distress,
            &mut cues.side_talk_connectives,
            &mut cues.emotional_markers,
            &mut cues.time_markers,
            &mut cues.place_markers,
            &mut cues.feeling_markers,
            &mut cues.unsure,
            &mut cues.negative_endings,
        ] {
            lowercase_all(list);
        }
        for synonyms in cues.choice_synonyms.values_mut() {
            lowercase_all(synonyms);
        }
    }

    /// Structural checks: every pool non-empty, placeholders present, and
    /// bubble strings distinguishable from spoken text.
    pub fn validate(&self) -> Result<(), LexiconError> {
        let mut problems = Vec::new();

        for (name, list) in [
            ("acts.greet", &self.acts.greet),
            ("acts.thanks", &self.acts.thanks),
            ("acts.apology", &self.acts.apology),
            ("acts.bye", &self.acts.bye),
            ("acts.confused", &self.acts.confused),
            ("acts.deny", &self.acts.deny),
            ("acts.affirm", &self.acts.affirm),
            ("acts.topic_switch", &self.acts.topic_switch),
        ] {
            if list.iter().all(|p| p.trim().is_empty()) {
                problems.push(format!("{name} has no phrases"));
            }
        }

        for (family, pool) in self.pools.flat() {
            if pool.is_empty() {
                problems.push(format!("pool '{family}' is empty"));
            }
            if pool.iter().any(|p| p.trim().is_empty()) {
                problems.push(format!("pool '{family}' contains a blank phrase"));
            }
        }

        for (family, pool, placeholder) in [
            ("greeting_mascot", &self.pools.greeting_mascot, "{mascot}"),
            ("confirm", &self.pools.confirm, "{value}"),
            ("recall", &self.pools.recall, "{value}"),
            ("name_call", &self.pools.name_call, "{name}"),
        ] {
            for phrase in pool {
                if !phrase.contains(placeholder) {
                    problems.push(format!(
                        "pool '{family}' phrase \"{phrase}\" lacks {placeholder}"
                    ));
                }
            }
        }

        for (family, pool) in [
            ("bubble_ack", &self.pools.bubble_ack),
            ("bubble_react", &self.pools.bubble_react),
        ] {
            for bubble in pool {
                if bubble.ends_with(TERMINATORS) {
                    problems.push(format!(
                        "bubble \"{bubble}\" in '{family}' ends like a sentence"
                    ));
                }
            }
        }

        if self.cues.unsure_value.trim().is_empty() {
            problems.push("cues.unsure_value is blank".to_string());
        }

        if problems.is_empty() {
            Ok(())
        } else {
            Err(LexiconError::Invalid(problems))
        }
    }
}

fn lowercase_all(list: &mut [String]) {
    for entry in list.iter_mut() {
        *entry = entry.trim().to_lowercase();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn builtin_lexicon_parses_and_validates() {
        let lexicon = Lexicon::builtin().unwrap();
        assert_eq!(lexicon.version, 1);
        lexicon.validate().unwrap();
        assert!(lexicon.acts.greet.contains(&"こんにちは".to_string()));
        assert!(!lexicon.pools.bubble_ack.is_empty());
    }

    #[test]
    fn keywords_are_lowercased_at_load() {
        let lexicon = Lexicon::builtin().unwrap();
        assert!(lexicon.acts.affirm.contains(&"ok".to_string()));
        assert!(lexicon
            .acts
            .affirm
            .iter()
            .all(|p| p.to_lowercase() == *p));
    }

    #[test]
    fn tone_and_kind_pools_resolve() {
        let lexicon = Lexicon::builtin().unwrap();
        assert_eq!(lexicon.pools.ack.get(Tone::Warm), &lexicon.pools.ack.warm[..]);
        assert_eq!(
            lexicon.pools.retry.get(AnswerKind::YesNo),
            &lexicon.pools.retry.yesno[..]
        );
        assert_eq!(
            lexicon.pools.closing.get(ClosingStyle::Playful),
            &lexicon.pools.closing.playful[..]
        );
    }

    #[test]
    fn validate_reports_every_problem() {
        let mut lexicon = Lexicon::builtin().unwrap();
        lexicon.pools.filler.clear();
        lexicon.pools.recall = vec!["さっきの話だけど。".to_string()];
        lexicon.pools.bubble_react.push("うん。".to_string());
        match lexicon.validate() {
            Err(LexiconError::Invalid(problems)) => {
                assert_eq!(problems.len(), 3, "{problems:?}");
                assert!(problems.iter().any(|p| p.contains("filler")));
                assert!(problems.iter().any(|p| p.contains("{value}")));
                assert!(problems.iter().any(|p| p.contains("bubble_react")));
            }
            other => panic!("expected Invalid, got {other:?}"),
        }
    }

    #[test]
    fn confirm_pool_is_optional_but_needs_value() {
        let mut lexicon = Lexicon::builtin().unwrap();
        lexicon.pools.confirm.clear();
        lexicon.validate().unwrap();
        lexicon.pools.confirm = vec!["了解。".to_string()];
        match lexicon.validate() {
            Err(LexiconError::Invalid(problems)) => {
                assert_eq!(problems.len(), 1, "{problems:?}");
                assert!(problems[0].contains("confirm"));
            }
            other => panic!("expected Invalid, got {other:?}"),
        }
    }

    #[test]
    fn parse_error_is_ron_variant() {
        let err = Lexicon::parse_ron("(version: 1").unwrap_err();
        assert!(matches!(err, LexiconError::Ron(_)));
    }

    #[test]
    fn missing_file_is_io_error() {
        let err = Lexicon::load_from_ron(Path::new("no/such/lexicon.ron")).unwrap_err();
        assert!(matches!(err, LexiconError::Io(_)));
    }
}
