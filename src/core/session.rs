/// Per-conversation state: scene position, the single pending question,
/// slot memory, short-term recall, and anti-repetition bookkeeping.

use rand::seq::SliceRandom;
use rand::Rng;
use rustc_hash::{FxHashMap, FxHashSet};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, VecDeque};

use crate::core::config::EngineConfig;
use crate::schema::act::{AnswerKind, Intent, Tone, Topic};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum Phase {
    #[default]
    Start,
    Conversation,
}

/// The one outstanding question. Exists only between asking and resolving.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Pending {
    pub topic: Topic,
    pub scene: String,
    pub slot: String,
    pub kind: AnswerKind,
    pub step_index: usize,
    pub retry_count: u8,
    pub last_prompt: String,
}

/// Topic → (slot → value).
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SlotMemory(BTreeMap<Topic, BTreeMap<String, String>>);

impl SlotMemory {
    pub fn get(&self, topic: Topic, slot: &str) -> Option<&str> {
        self.0.get(&topic)?.get(slot).map(String::as_str)
    }

    pub fn set(&mut self, topic: Topic, slot: &str, value: &str) {
        self.0
            .entry(topic)
            .or_default()
            .insert(slot.to_string(), value.to_string());
    }

    pub fn topic(&self, topic: Topic) -> Option<&BTreeMap<String, String>> {
        self.0.get(&topic)
    }

    pub fn is_empty(&self) -> bool {
        self.0.values().all(BTreeMap::is_empty)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StickyEntry {
    pub slot: String,
    pub value: String,
    pub topic: Topic,
    pub ttl: u8,
    pub used: bool,
}

/// Bounded FIFO of recent slot values available for callback remarks.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StickyQueue {
    entries: VecDeque<StickyEntry>,
    capacity: usize,
}

impl StickyQueue {
    pub fn new(capacity: usize) -> Self {
        Self {
            entries: VecDeque::with_capacity(capacity),
            capacity: capacity.max(1),
        }
    }

    /// Make room by evicting a used entry first, the oldest otherwise.
    pub fn push(&mut self, entry: StickyEntry) {
        if entry.ttl == 0 {
            return;
        }
        while self.entries.len() >= self.capacity {
            match self.entries.iter().position(|e| e.used) {
                Some(i) => {
                    self.entries.remove(i);
                }
                None => {
                    self.entries.pop_front();
                }
            }
        }
        self.entries.push_back(entry);
    }

    /// One turn passes: age every entry and drop the expired ones.
    pub fn tick(&mut self) {
        for entry in &mut self.entries {
            entry.ttl = entry.ttl.saturating_sub(1);
        }
        self.entries.retain(|e| e.ttl >= 1);
    }

    /// Most recent entry not yet recalled; marks it used.
    pub fn take_unused(&mut self) -> Option<StickyEntry> {
        let entry = self.entries.iter_mut().rev().find(|e| !e.used)?;
        entry.used = true;
        Some(entry.clone())
    }

    pub fn has_unused(&self) -> bool {
        self.entries.iter().any(|e| !e.used)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    pub fn iter(&self) -> impl Iterator<Item = &StickyEntry> {
        self.entries.iter()
    }
}

/// Last few phrases emitted per pool family.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PhraseMemory {
    recent: FxHashMap<String, VecDeque<String>>,
    limit: usize,
}

impl PhraseMemory {
    pub fn new(limit: usize) -> Self {
        Self {
            recent: FxHashMap::default(),
            limit: limit.max(1),
        }
    }

    /// Sample from `pool`, skipping the family's recent phrases. Falls back
    /// to excluding only the last phrase, then to the whole pool, so a
    /// single-element pool still yields its phrase.
    pub fn pick<R: Rng>(&mut self, family: &str, pool: &[String], rng: &mut R) -> Option<String> {
        let recent = self.recent.get(family);
        let seen = |p: &String| recent.is_some_and(|r| r.contains(p));
        let last = recent.and_then(|r| r.back());

        let mut candidates: Vec<&String> = pool.iter().filter(|p| !seen(*p)).collect();
        if candidates.is_empty() {
            candidates = pool.iter().filter(|p| Some(*p) != last).collect();
        }
        if candidates.is_empty() {
            candidates = pool.iter().collect();
        }
        let choice = (*candidates.choose(rng)?).clone();

        let slot = self.recent.entry(family.to_string()).or_default();
        slot.push_back(choice.clone());
        while slot.len() > self.limit {
            slot.pop_front();
        }
        Some(choice)
    }

    pub fn last(&self, family: &str) -> Option<&str> {
        self.recent.get(family)?.back().map(String::as_str)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Speaker {
    User,
    Companion,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TranscriptLine {
    pub speaker: Speaker,
    pub text: String,
}

/// Everything one conversation remembers. Serializable so a persistence
/// collaborator can snapshot it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SessionState {
    pub phase: Phase,
    pub turn: u64,
    pub active_topic: Option<Topic>,
    pub active_scene: Option<String>,
    pub step_index: usize,
    pub pending: Option<Pending>,
    /// Last question spoken, for re-asking after social interjections.
    pub last_question: Option<String>,
    pub slots: SlotMemory,
    pub sticky: StickyQueue,
    pub last_user_text: String,
    pub last_bot_text: String,
    pub intent: Intent,
    pub tone: Tone,
    pub recent_responses: VecDeque<String>,
    pub completed_scenes: FxHashSet<String>,
    pub phrases: PhraseMemory,
    pub history: VecDeque<TranscriptLine>,
    history_limit: usize,
}

impl SessionState {
    pub fn new(config: &EngineConfig) -> Self {
        Self {
            phase: Phase::Start,
            turn: 0,
            active_topic: None,
            active_scene: None,
            step_index: 0,
            pending: None,
            last_question: None,
            slots: SlotMemory::default(),
            sticky: StickyQueue::new(config.sticky_capacity),
            last_user_text: String::new(),
            last_bot_text: String::new(),
            intent: Intent::Chat,
            tone: Tone::Light,
            recent_responses: VecDeque::with_capacity(2),
            completed_scenes: FxHashSet::default(),
            phrases: PhraseMemory::new(config.recent_phrase_limit),
            history: VecDeque::new(),
            history_limit: config.history_limit.max(2),
        }
    }

    /// Topic switch: forget where we are, keep what we learned.
    pub fn clear_topic(&mut self) {
        self.active_topic = None;
        self.active_scene = None;
        self.step_index = 0;
        self.pending = None;
        self.last_question = None;
    }

    /// Scene completion keeps the topic.
    pub fn clear_scene(&mut self) {
        self.active_scene = None;
        self.step_index = 0;
        self.pending = None;
        self.last_question = None;
    }

    pub fn record(&mut self, user_text: &str, reply_text: &str) {
        self.last_user_text = user_text.to_string();
        self.last_bot_text = reply_text.to_string();
        self.recent_responses.push_back(reply_text.to_string());
        while self.recent_responses.len() > 2 {
            self.recent_responses.pop_front();
        }
        if !user_text.is_empty() {
            self.push_history(Speaker::User, user_text);
        }
        self.push_history(Speaker::Companion, reply_text);
    }

    fn push_history(&mut self, speaker: Speaker, text: &str) {
        self.history.push_back(TranscriptLine {
            speaker,
            text: text.to_string(),
        });
        while self.history.len() > self.history_limit {
            self.history.pop_front();
        }
    }

    /// Structural invariants that hold independent of the catalog.
    pub fn check_invariants(&self) -> Result<(), String> {
        if let Some(pending) = &self.pending {
            let (Some(topic), Some(scene)) = (self.active_topic, self.active_scene.as_deref()) else {
                return Err(format!(
                    "pending '{}' without an active topic and scene",
                    pending.slot
                ));
            };
            if pending.topic != topic || pending.scene != scene {
                return Err(format!(
                    "pending '{}' belongs to {}/{:?}, active is {scene}/{topic:?}",
                    pending.slot, pending.scene, pending.topic
                ));
            }
            if pending.step_index != self.step_index {
                return Err(format!(
                    "pending step {} differs from step index {}",
                    pending.step_index, self.step_index
                ));
            }
        }
        if self.active_scene.is_some() && self.active_topic.is_none() {
            return Err("active scene without an active topic".to_string());
        }
        if self.sticky.len() > self.sticky.capacity() {
            return Err(format!("sticky queue holds {} entries", self.sticky.len()));
        }
        if self.sticky.iter().any(|e| e.ttl < 1) {
            return Err("sticky entry with expired ttl".to_string());
        }
        if self.recent_responses.len() > 2 {
            return Err("more than two recent responses".to_string());
        }
        Ok(())
    }
}
