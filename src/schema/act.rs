use serde::{Deserialize, Serialize};

use super::reply::Mood;

/// The speech act of a single utterance. Derived per turn, never stored.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Act {
    Greet,
    Thanks,
    Apology,
    Bye,
    Confused,
    Affirm,
    Deny,
    TopicSwitch,
    TopicSelect,
    Free,
}

impl Act {
    /// Acts answered with a social formula regardless of the scene state.
    pub fn is_social(&self) -> bool {
        matches!(self, Self::Greet | Self::Thanks | Self::Apology | Self::Bye)
    }
}

/// Broad conversation category. Every scene belongs to exactly one topic,
/// encoded as the prefix of its name (`plan-weekend` → `Plan`).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum Topic {
    Plan,
    Body,
    Hobby,
    Social,
    Choice,
}

impl Topic {
    pub const ALL: [Topic; 5] = [
        Topic::Plan,
        Topic::Body,
        Topic::Hobby,
        Topic::Social,
        Topic::Choice,
    ];

    /// Scene-name namespace for this topic (e.g., "plan").
    pub fn prefix(&self) -> &'static str {
        match self {
            Self::Plan => "plan",
            Self::Body => "body",
            Self::Hobby => "hobby",
            Self::Social => "social",
            Self::Choice => "choice",
        }
    }

    /// Re-derive the owning topic from a scene name such as `body-pain`.
    pub fn from_scene_name(name: &str) -> Option<Topic> {
        let prefix = name.split('-').next()?;
        Self::ALL.into_iter().find(|t| t.prefix() == prefix)
    }
}

/// What shape of answer a scripted step expects.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum AnswerKind {
    Free,
    Time,
    Place,
    Item,
    YesNo,
    Feeling,
    Choice,
}

impl AnswerKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Free => "free",
            Self::Time => "time",
            Self::Place => "place",
            Self::Item => "item",
            Self::YesNo => "yesno",
            Self::Feeling => "feeling",
            Self::Choice => "choice",
        }
    }

    /// Kinds whose answers are short facts; emotional outbursts while one
    /// of these is pending count as side talk.
    pub fn is_terse(&self) -> bool {
        matches!(self, Self::Time | Self::Place | Self::Item)
    }

    /// Kinds whose accepted values are echoed back when short. Yes/no and
    /// feeling answers get a tone ack instead.
    pub fn is_confirmable(&self) -> bool {
        matches!(
            self,
            Self::Free | Self::Time | Self::Place | Self::Item | Self::Choice
        )
    }

    /// Kinds whose values are worth recalling later in the conversation.
    pub fn is_memorable(&self) -> bool {
        matches!(self, Self::Free | Self::Place | Self::Item)
    }
}

/// Session-level goal inferred from lexical cues. Biases phrase pools only.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum Intent {
    #[default]
    Chat,
    Comfort,
    Decide,
}

/// Register of the acknowledgment pool sampled this turn.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum Tone {
    #[default]
    Light,
    Warm,
    Hype,
    Calm,
}

impl Tone {
    /// The facial/voice mood that matches this tone when nothing overrides it.
    pub fn mood(&self) -> Mood {
        match self {
            Self::Light => Mood::Neutral,
            Self::Warm => Mood::Concerned,
            Self::Hype => Mood::Happy,
            Self::Calm => Mood::Calm,
        }
    }
}

/// Style family for the line that closes a finished scene.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ClosingStyle {
    Soft,
    Forward,
    Playful,
}
