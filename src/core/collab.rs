/// Seams to the widget's outer surfaces: speech synthesis and preference
/// persistence. The engine never calls these; hosts wire them around
/// `DialogueEngine::step`.

use rustc_hash::FxHashMap;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::schema::reply::{Mode, Mood, Reply, TurnContext};

pub const DEFAULT_MASCOT_NAME: &str = "まるもち";
pub const MAX_NAME_CHARS: usize = 24;

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct VoiceSettings {
    pub rate: f32,
    pub pitch: f32,
    pub volume: f32,
}

impl Default for VoiceSettings {
    fn default() -> Self {
        Self {
            rate: 1.0,
            pitch: 1.0,
            volume: 1.0,
        }
    }
}

/// One line handed to a speech backend.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Utterance {
    pub text: String,
    pub lang: String,
    pub voice: VoiceSettings,
}

impl Utterance {
    /// Speak the reply's text channel; the bubble is never voiced. Mood
    /// nudges pitch and rate within the backend's 0.1..=2.0 range.
    pub fn from_reply(reply: &Reply, base: VoiceSettings) -> Self {
        let (pitch, rate) = match reply.mood {
            Mood::Happy => (0.2, 0.1),
            Mood::Calm => (-0.1, -0.1),
            Mood::Neutral | Mood::Concerned | Mood::Serious => (0.0, 0.0),
        };
        Self {
            text: reply.text.clone(),
            lang: "ja-JP".to_string(),
            voice: VoiceSettings {
                rate: (base.rate + rate).clamp(0.1, 2.0),
                pitch: (base.pitch + pitch).clamp(0.1, 2.0),
                volume: base.volume.clamp(0.0, 1.0),
            },
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SpeechEvent {
    Started,
    Ended,
}

/// Text-to-speech backend. Implementations report start and end so the
/// widget can animate the mascot's mouth.
pub trait SpeechOutput {
    fn speak(&mut self, utterance: &Utterance, on_event: &mut dyn FnMut(SpeechEvent));
}

/// Backend that records utterances instead of voicing them.
#[derive(Debug, Default)]
pub struct SilentSpeech {
    pub spoken: Vec<Utterance>,
}

impl SpeechOutput for SilentSpeech {
    fn speak(&mut self, utterance: &Utterance, on_event: &mut dyn FnMut(SpeechEvent)) {
        on_event(SpeechEvent::Started);
        self.spoken.push(utterance.clone());
        on_event(SpeechEvent::Ended);
    }
}

#[derive(Debug, Error)]
pub enum PreferenceError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("RON parse error: {0}")]
    Ron(#[from] ron::error::SpannedError),
    #[error("RON write error: {0}")]
    RonWrite(#[from] ron::Error),
}

/// What the widget remembers about the user between visits.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Preferences {
    pub user_name: String,
    pub mascot_name: String,
    pub mode: Mode,
}

impl Default for Preferences {
    fn default() -> Self {
        Self {
            user_name: String::new(),
            mascot_name: DEFAULT_MASCOT_NAME.to_string(),
            mode: Mode::Chat,
        }
    }
}

fn clip(name: &str) -> String {
    name.trim().chars().take(MAX_NAME_CHARS).collect()
}

impl Preferences {
    /// Trim and clip names; an empty mascot name falls back to the default.
    pub fn sanitized(self) -> Self {
        let mascot = clip(&self.mascot_name);
        Self {
            user_name: clip(&self.user_name),
            mascot_name: if mascot.is_empty() {
                DEFAULT_MASCOT_NAME.to_string()
            } else {
                mascot
            },
            mode: self.mode,
        }
    }

    pub fn to_context(&self) -> TurnContext {
        TurnContext::new(self.mode)
            .with_user_name(&self.user_name)
            .with_mascot_name(&self.mascot_name)
    }
}

pub trait PreferenceStore {
    /// Stored preferences, or defaults when nothing was saved yet.
    fn load(&self) -> Result<Preferences, PreferenceError>;
    fn save(&mut self, prefs: &Preferences) -> Result<(), PreferenceError>;
}

/// In-memory store keyed by profile, for tests and the wasm host.
#[derive(Debug, Default)]
pub struct MemoryPreferences {
    profiles: FxHashMap<String, Preferences>,
    active: String,
}

impl MemoryPreferences {
    pub fn new(profile: &str) -> Self {
        Self {
            profiles: FxHashMap::default(),
            active: profile.to_string(),
        }
    }
}

impl PreferenceStore for MemoryPreferences {
    fn load(&self) -> Result<Preferences, PreferenceError> {
        Ok(self.profiles.get(&self.active).cloned().unwrap_or_default())
    }

    fn save(&mut self, prefs: &Preferences) -> Result<(), PreferenceError> {
        self.profiles
            .insert(self.active.clone(), prefs.clone().sanitized());
        Ok(())
    }
}

/// RON file on disk. A missing file loads as defaults.
#[derive(Debug, Clone)]
pub struct RonFilePreferences {
    path: std::path::PathBuf,
}

impl RonFilePreferences {
    pub fn new(path: impl Into<std::path::PathBuf>) -> Self {
        Self { path: path.into() }
    }
}

impl PreferenceStore for RonFilePreferences {
    fn load(&self) -> Result<Preferences, PreferenceError> {
        if !self.path.exists() {
            return Ok(Preferences::default());
        }
        let contents = std::fs::read_to_string(&self.path)?;
        let prefs: Preferences = ron::from_str(&contents)?;
        Ok(prefs.sanitized())
    }

    fn save(&mut self, prefs: &Preferences) -> Result<(), PreferenceError> {
        let text = ron::ser::to_string_pretty(&prefs.clone().sanitized(), ron::ser::PrettyConfig::default())?;
        std::fs::write(&self.path, text)?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn reply(mood: Mood) -> Reply {
        Reply {
            text: "いいね！".to_string(),
            bubble: "うん".to_string(),
            mood,
        }
    }

    #[test]
    fn mood_adjusts_voice_within_bounds() {
        let happy = Utterance::from_reply(&reply(Mood::Happy), VoiceSettings::default());
        assert!((happy.voice.pitch - 1.2).abs() < 1e-6);
        assert!((happy.voice.rate - 1.1).abs() < 1e-6);
        assert_eq!(happy.lang, "ja-JP");

        let fast = VoiceSettings {
            rate: 1.95,
            pitch: 0.15,
            volume: 1.0,
        };
        let capped = Utterance::from_reply(&reply(Mood::Happy), fast);
        assert!((capped.voice.rate - 2.0).abs() < 1e-6);
        let floored = Utterance::from_reply(&reply(Mood::Calm), fast);
        assert!((floored.voice.pitch - 0.1).abs() < 1e-6);
    }

    #[test]
    fn silent_speech_reports_events() {
        let mut speech = SilentSpeech::default();
        let mut events = Vec::new();
        let utterance = Utterance::from_reply(&reply(Mood::Neutral), VoiceSettings::default());
        speech.speak(&utterance, &mut |e| events.push(e));
        assert_eq!(events, vec![SpeechEvent::Started, SpeechEvent::Ended]);
        assert_eq!(speech.spoken[0].text, "いいね！");
    }

    #[test]
    fn preferences_sanitize_names() {
        let prefs = Preferences {
            user_name: "  ゆき  ".to_string(),
            mascot_name: "   ".to_string(),
            mode: Mode::Work,
        }
        .sanitized();
        assert_eq!(prefs.user_name, "ゆき");
        assert_eq!(prefs.mascot_name, DEFAULT_MASCOT_NAME);

        let long = Preferences {
            mascot_name: "も".repeat(30),
            ..Preferences::default()
        }
        .sanitized();
        assert_eq!(long.mascot_name.chars().count(), MAX_NAME_CHARS);
    }

    #[test]
    fn memory_store_round_trip() {
        let mut store = MemoryPreferences::new("default");
        assert_eq!(store.load().unwrap(), Preferences::default());
        let prefs = Preferences {
            user_name: "ゆき".to_string(),
            mode: Mode::Work,
            ..Preferences::default()
        };
        store.save(&prefs).unwrap();
        let loaded = store.load().unwrap();
        assert_eq!(loaded, prefs);
        let ctx = loaded.to_context();
        assert_eq!(ctx.mode, Mode::Work);
        assert_eq!(ctx.user_name, "ゆき");
    }
}
