//! WASM bindings for companion-dialogue, the chat widget's engine handle.

use wasm_bindgen::prelude::*;

use companion_dialogue::core::collab::{Preferences, Utterance, VoiceSettings};
use companion_dialogue::core::session::SessionState;
use companion_dialogue::{DialogueEngine, Mode, Reply, TurnContext};

// ---------------------------------------------------------------------------
// JSON helper types for communication across the WASM boundary
// ---------------------------------------------------------------------------
#[derive(serde::Serialize)]
struct TopicInfo {
    topic: String,
    label: String,
    default_scene: String,
}

#[derive(serde::Serialize)]
struct TurnOutput<'a> {
    reply: &'a Reply,
    utterance: Utterance,
}

// ---------------------------------------------------------------------------
// Conversion helpers
// ---------------------------------------------------------------------------
/// Missing or malformed context means the defaults: chat mode, no names.
fn parse_context(context_json: &str) -> TurnContext {
    serde_json::from_str(context_json).unwrap_or_default()
}

fn build_engine(seed: u64) -> Result<DialogueEngine, JsError> {
    DialogueEngine::builder()
        .seed(seed)
        .build()
        .map_err(|e| JsError::new(&format!("Engine build error: {e}")))
}

// ---------------------------------------------------------------------------
// CompanionChat, the main exported struct
// ---------------------------------------------------------------------------
#[wasm_bindgen]
pub struct CompanionChat {
    engine: DialogueEngine,
    voice: VoiceSettings,
}

#[wasm_bindgen]
impl CompanionChat {
    /// Create a conversation with the built-in Japanese tables.
    #[wasm_bindgen(constructor)]
    pub fn new(seed: u64) -> Result<CompanionChat, JsError> {
        Ok(CompanionChat {
            engine: build_engine(seed)?,
            voice: VoiceSettings::default(),
        })
    }

    /// One turn. `context_json` is `{"mode","userName","mascotName"}`, any
    /// field optional. Returns the reply plus the utterance to voice.
    pub fn step(&mut self, text: &str, context_json: &str) -> Result<String, JsError> {
        let ctx = parse_context(context_json);
        let reply = self.engine.step(text, &ctx);
        self.output(&reply)
    }

    pub fn begin_scene(&mut self, scene: &str, context_json: &str) -> Result<String, JsError> {
        let ctx = parse_context(context_json);
        let reply = self
            .engine
            .begin_scene(scene, &ctx)
            .map_err(|e| JsError::new(&format!("Scene error: {e}")))?;
        self.output(&reply)
    }

    /// Announce a chat/work toggle. Unknown modes read as chat.
    pub fn mode_notice(&mut self, mode: &str) -> Result<String, JsError> {
        let reply = self.engine.mode_notice(Mode::parse(mode));
        self.output(&reply)
    }

    pub fn set_voice(&mut self, rate: f32, pitch: f32, volume: f32) {
        self.voice = VoiceSettings {
            rate,
            pitch,
            volume,
        };
    }

    /// Turn stored preferences into the context JSON `step` expects.
    pub fn context_from_preferences(prefs_json: &str) -> Result<String, JsError> {
        let prefs: Preferences = serde_json::from_str(prefs_json)
            .map_err(|e| JsError::new(&format!("Invalid preferences JSON: {e}")))?;
        serde_json::to_string(&prefs.sanitized().to_context())
            .map_err(|e| JsError::new(&format!("Serialization error: {e}")))
    }

    pub fn topics(&self) -> Result<String, JsError> {
        let topics: Vec<TopicInfo> = self
            .engine
            .catalog()
            .topics
            .iter()
            .map(|entry| TopicInfo {
                topic: format!("{:?}", entry.topic).to_lowercase(),
                label: entry.label.clone(),
                default_scene: entry.default_scene.clone(),
            })
            .collect();
        serde_json::to_string(&topics)
            .map_err(|e| JsError::new(&format!("Serialization error: {e}")))
    }

    pub fn session_json(&self) -> Result<String, JsError> {
        serde_json::to_string(self.engine.session())
            .map_err(|e| JsError::new(&format!("Serialization error: {e}")))
    }

    pub fn restore_session(&mut self, session_json: &str) -> Result<(), JsError> {
        let state: SessionState = serde_json::from_str(session_json)
            .map_err(|e| JsError::new(&format!("Invalid session JSON: {e}")))?;
        self.engine
            .restore_session(state)
            .map_err(|e| JsError::new(&format!("Session error: {e}")))
    }

    /// Start over with a new seed.
    pub fn reset(&mut self, seed: u64) {
        self.engine.reset(seed);
    }
}

// Private helpers
impl CompanionChat {
    fn output(&self, reply: &Reply) -> Result<String, JsError> {
        let out = TurnOutput {
            reply,
            utterance: Utterance::from_reply(reply, self.voice),
        };
        serde_json::to_string(&out)
            .map_err(|e| JsError::new(&format!("Serialization error: {e}")))
    }
}
