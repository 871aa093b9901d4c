use serde::{Deserialize, Serialize};

/// Mood tag attached to a reply. The speech collaborator shapes pitch and
/// rate from it; the widget may pick an expression from it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Mood {
    #[default]
    Neutral,
    Happy,
    Concerned,
    Serious,
    Calm,
}

impl Mood {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Neutral => "neutral",
            Self::Happy => "happy",
            Self::Concerned => "concerned",
            Self::Serious => "serious",
            Self::Calm => "calm",
        }
    }
}

/// Conversation framing selected by the user.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Mode {
    #[default]
    Chat,
    Work,
}

impl Mode {
    /// Lenient parse; anything unrecognized is chat mode.
    pub fn parse(s: &str) -> Mode {
        match s.trim().to_lowercase().as_str() {
            "work" => Mode::Work,
            _ => Mode::Chat,
        }
    }
}

/// Per-turn context handed in by the caller. Missing fields mean defaults.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct TurnContext {
    pub mode: Mode,
    pub user_name: String,
    pub mascot_name: String,
}

impl TurnContext {
    pub fn new(mode: Mode) -> Self {
        Self {
            mode,
            ..Self::default()
        }
    }

    pub fn with_user_name(mut self, name: &str) -> Self {
        self.user_name = name.to_string();
        self
    }

    pub fn with_mascot_name(mut self, name: &str) -> Self {
        self.mascot_name = name.to_string();
        self
    }

    /// Trimmed copy; whitespace-only names count as absent.
    pub fn normalized(&self) -> TurnContext {
        TurnContext {
            mode: self.mode,
            user_name: self.user_name.trim().to_string(),
            mascot_name: self.mascot_name.trim().to_string(),
        }
    }
}

/// The two-channel output of one turn.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Reply {
    /// Spoken/transcript text.
    pub text: String,
    /// Short nonverbal reaction shown in a transient overlay.
    pub bubble: String,
    pub mood: Mood,
}
