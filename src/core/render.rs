/// Response renderer: joins phrase fragments into spoken text, applies the
/// optional embellishments, and samples the nonverbal bubble.

use rand::Rng;

use crate::core::config::EngineConfig;
use crate::core::lexicon::{Lexicon, TERMINATORS};
use crate::core::session::SessionState;
use crate::schema::reply::{Mood, Reply, TurnContext};

/// Which nonverbal pool the bubble is drawn from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum BubbleHint {
    /// Back-channel nods: "うん", "なるほど".
    #[default]
    Ack,
    /// Gestures in parentheses: "（こくこく）".
    React,
}

/// What the turn processor decided to say, before rendering.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Draft {
    pub lead: Option<String>,
    pub body: Option<String>,
    pub question: Option<String>,
    pub mood: Mood,
    pub bubble: BubbleHint,
    /// Allow name-call, softener, and recall rolls.
    pub embellish: bool,
}

impl Draft {
    pub fn new(mood: Mood, bubble: BubbleHint) -> Self {
        Self {
            mood,
            bubble,
            embellish: true,
            ..Self::default()
        }
    }

    pub fn lead(mut self, text: impl Into<String>) -> Self {
        self.lead = Some(text.into());
        self
    }

    pub fn body(mut self, text: impl Into<String>) -> Self {
        self.body = Some(text.into());
        self
    }

    pub fn question(mut self, text: impl Into<String>) -> Self {
        self.question = Some(text.into());
        self
    }

    /// Fixed lines (greetings, notices) that must not be embellished.
    pub fn plain(mut self) -> Self {
        self.embellish = false;
        self
    }
}

/// Join fragments into one utterance. Each fragment is closed with "。"
/// unless it already ends in a terminator, then doubled terminators are
/// collapsed.
pub fn compose(fragments: &[&str]) -> String {
    let mut out = String::new();
    for fragment in fragments {
        let fragment = fragment.trim();
        if fragment.is_empty() {
            continue;
        }
        out.push_str(fragment);
        if !fragment.ends_with(TERMINATORS) && !fragment.ends_with('）') {
            out.push('。');
        }
    }
    collapse_terminators(&out)
}

fn collapse_terminators(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    let mut prev: Option<char> = None;
    for c in text.chars() {
        if let Some(p) = prev {
            let prev_is_end = TERMINATORS.contains(&p);
            if c == '。' && prev_is_end {
                continue;
            }
            if (c == '？' || c == '?') && c == p {
                continue;
            }
        }
        out.push(c);
        prev = Some(c);
    }
    out
}

/// Render a draft into the final two-channel reply.
pub fn render<R: Rng>(
    draft: Draft,
    ctx: &TurnContext,
    lexicon: &Lexicon,
    config: &EngineConfig,
    session: &mut SessionState,
    rng: &mut R,
) -> Reply {
    let pools = &lexicon.pools;
    let mut body = draft.body;
    let mut prefix = String::new();

    if draft.embellish {
        if body.is_none() && session.sticky.has_unused() && rng.gen_bool(config.recall_rate) {
            if let Some(entry) = session.sticky.take_unused() {
                body = session
                    .phrases
                    .pick("recall", &pools.recall, rng)
                    .map(|line| line.replace("{value}", &entry.value));
            }
        }
        if body.is_none() && rng.gen_bool(config.softener_rate) {
            body = session.phrases.pick("softener", &pools.softener, rng);
        }
        if !ctx.user_name.is_empty() && rng.gen_bool(config.name_call_rate) {
            if let Some(call) = session.phrases.pick("name_call", &pools.name_call, rng) {
                prefix = call.replace("{name}", &ctx.user_name);
            }
        }
    }

    let fragments: Vec<&str> = [&draft.lead, &body, &draft.question]
        .into_iter()
        .flatten()
        .map(String::as_str)
        .collect();
    let text = format!("{prefix}{}", compose(&fragments));

    let (family, pool, other) = match draft.bubble {
        BubbleHint::Ack => ("bubble_ack", &pools.bubble_ack, &pools.bubble_react),
        BubbleHint::React => ("bubble_react", &pools.bubble_react, &pools.bubble_ack),
    };
    let mut bubble = session.phrases.pick(family, pool, rng).unwrap_or_default();
    if bubble == text {
        bubble = other.iter().find(|b| **b != text).cloned().unwrap_or_default();
    }

    Reply {
        text,
        bubble,
        mood: draft.mood,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::rngs::StdRng;
    use rand::SeedableRng;

    use crate::core::session::StickyEntry;
    use crate::schema::act::Topic;

    #[test]
    fn compose_closes_and_collapses() {
        assert_eq!(compose(&["うんうん", "いつの話？"]), "うんうん。いつの話？");
        assert_eq!(compose(&["そっか。。", "", "どう？？"]), "そっか。どう？");
        assert_eq!(compose(&["いいね！", "（メモ中）"]), "いいね！（メモ中）");
        assert_eq!(compose(&[]), "");
    }

    #[test]
    fn plain_draft_has_no_embellishment() {
        let lexicon = Lexicon::builtin().unwrap();
        let config = EngineConfig {
            name_call_rate: 1.0,
            softener_rate: 1.0,
            ..EngineConfig::default()
        };
        let mut session = SessionState::new(&config);
        let mut rng = StdRng::seed_from_u64(1);
        let ctx = TurnContext::default().with_user_name("ゆき");
        let draft = Draft::new(Mood::Happy, BubbleHint::Ack).lead("こんにちは").plain();
        let reply = render(draft, &ctx, &lexicon, &config, &mut session, &mut rng);
        assert_eq!(reply.text, "こんにちは。");
        assert_eq!(reply.mood, Mood::Happy);
        assert!(lexicon.pools.bubble_ack.contains(&reply.bubble));
    }

    #[test]
    fn name_call_and_softener_when_forced() {
        let lexicon = Lexicon::builtin().unwrap();
        let config = EngineConfig {
            name_call_rate: 1.0,
            softener_rate: 1.0,
            recall_rate: 0.0,
            ..EngineConfig::default()
        };
        let mut session = SessionState::new(&config);
        let mut rng = StdRng::seed_from_u64(2);
        let ctx = TurnContext::default().with_user_name("ゆき");
        let draft = Draft::new(Mood::Neutral, BubbleHint::React).lead("うんうん");
        let reply = render(draft, &ctx, &lexicon, &config, &mut session, &mut rng);
        assert!(reply.text.contains("ゆき、"), "{}", reply.text);
        assert!(
            lexicon.pools.softener.iter().any(|s| reply.text.contains(s.as_str())),
            "{}",
            reply.text
        );
        assert!(lexicon.pools.bubble_react.contains(&reply.bubble));
    }

    #[test]
    fn recall_consumes_sticky_entry() {
        let lexicon = Lexicon::builtin().unwrap();
        let config = EngineConfig {
            recall_rate: 1.0,
            softener_rate: 0.0,
            name_call_rate: 0.0,
            ..EngineConfig::default()
        };
        let mut session = SessionState::new(&config);
        session.sticky.push(StickyEntry {
            slot: "destination".to_string(),
            value: "京都".to_string(),
            topic: Topic::Plan,
            ttl: 3,
            used: false,
        });
        let mut rng = StdRng::seed_from_u64(3);
        let draft = Draft::new(Mood::Neutral, BubbleHint::Ack).lead("なるほど");
        let reply = render(draft, &TurnContext::default(), &lexicon, &config, &mut session, &mut rng);
        assert!(reply.text.contains("京都"), "{}", reply.text);
        assert!(!session.sticky.has_unused());
    }

    #[test]
    fn bubble_never_equals_text() {
        let lexicon = Lexicon::builtin().unwrap();
        let config = EngineConfig::default();
        let mut session = SessionState::new(&config);
        let mut rng = StdRng::seed_from_u64(4);
        for bubble in lexicon.pools.bubble_ack.clone() {
            let draft = Draft::new(Mood::Neutral, BubbleHint::Ack).lead(bubble).plain();
            let reply =
                render(draft, &TurnContext::default(), &lexicon, &config, &mut session, &mut rng);
            assert_ne!(reply.text, reply.bubble);
        }
    }
}
