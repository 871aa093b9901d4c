/// The turn processor: owns one conversation's state and answers each
/// utterance with a two-channel reply.
///
/// Routing per turn: social acts and topic switches are handled globally,
/// then an active scene resolves the utterance against its current step,
/// otherwise the topic selector runs.

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use std::path::PathBuf;
use thiserror::Error;
use tracing::{debug, info, warn};

use crate::core::answer::{branch_fires, is_side_talk, resolve_answer};
use crate::core::catalog::{CatalogError, SceneCatalog};
use crate::core::classify::{
    classify, closing_style, has_distress, infer_intent, infer_tone, normalize,
};
use crate::core::config::{ConfigError, EngineConfig};
use crate::core::lexicon::{Lexicon, LexiconError, PhrasePools};
use crate::core::render::{render, BubbleHint, Draft};
use crate::core::session::{Pending, Phase, SessionState, StickyEntry};
use crate::schema::act::{Act, AnswerKind, ClosingStyle, Tone, Topic};
use crate::schema::reply::{Mode, Mood, Reply, TurnContext};
use crate::schema::scene::Step;

#[derive(Debug, Error)]
pub enum EngineError {
    #[error("lexicon error: {0}")]
    Lexicon(#[from] LexiconError),
    #[error("catalog error: {0}")]
    Catalog(#[from] CatalogError),
    #[error("config error: {0}")]
    Config(#[from] ConfigError),
    #[error("unknown scene: {0}")]
    UnknownScene(String),
    #[error("invalid session: {0}")]
    InvalidSession(String),
}

/// One conversation. Built via `DialogueEngine::builder()`.
pub struct DialogueEngine {
    lexicon: Lexicon,
    catalog: SceneCatalog,
    config: EngineConfig,
    session: SessionState,
    rng: StdRng,
    seed: u64,
    /// Distress cue seen in the current utterance.
    distress: bool,
    /// Slot values accepted this turn; queued for recall once the reply is
    /// rendered so a value is never echoed back in the turn it was given.
    fresh_recall: Vec<StickyEntry>,
}

/// Builder for constructing a `DialogueEngine`.
pub struct DialogueEngineBuilder {
    seed: u64,
    data_dir: Option<PathBuf>,
    config_file: Option<PathBuf>,
    /// Directly provided tables (for testing without files).
    lexicon: Option<Lexicon>,
    catalog: Option<SceneCatalog>,
    config: Option<EngineConfig>,
}

fn tone_family(tone: Tone) -> &'static str {
    match tone {
        Tone::Light => "ack.light",
        Tone::Warm => "ack.warm",
        Tone::Hype => "ack.hype",
        Tone::Calm => "ack.calm",
    }
}

fn closing_family(style: ClosingStyle) -> &'static str {
    match style {
        ClosingStyle::Soft => "closing.soft",
        ClosingStyle::Forward => "closing.forward",
        ClosingStyle::Playful => "closing.playful",
    }
}

impl DialogueEngine {
    pub fn builder() -> DialogueEngineBuilder {
        DialogueEngineBuilder {
            seed: 0,
            data_dir: None,
            config_file: None,
            lexicon: None,
            catalog: None,
            config: None,
        }
    }

    /// Process one user utterance. Never fails: unknown input, missing
    /// context, and exhausted retries all resolve to an ordinary reply.
    pub fn step(&mut self, user_text: &str, ctx: &TurnContext) -> Reply {
        let ctx = ctx.normalized();
        let text = user_text.trim();
        self.begin_turn();
        let draft = if text.is_empty() {
            self.on_empty(&ctx)
        } else {
            self.on_utterance(text, &ctx)
        };
        self.finish(text, draft, &ctx)
    }

    /// Start a named scene directly, as a topic button in the widget would.
    pub fn begin_scene(&mut self, name: &str, ctx: &TurnContext) -> Result<Reply, EngineError> {
        if self.catalog.scene(name).is_none() {
            return Err(EngineError::UnknownScene(name.to_string()));
        }
        let ctx = ctx.normalized();
        self.begin_turn();
        self.session.phase = Phase::Conversation;
        self.session.clear_topic();
        let draft = self.start_scene(name, None, &ctx);
        Ok(self.finish("", draft, &ctx))
    }

    /// The fixed line announced when the user toggles chat/work mode.
    pub fn mode_notice(&mut self, mode: Mode) -> Reply {
        let (line, mood) = match mode {
            Mode::Chat => (self.say("mode_chat", |p| &p.mode_chat[..]), Mood::Happy),
            Mode::Work => (self.say("mode_work", |p| &p.mode_work[..]), Mood::Serious),
        };
        let ctx = TurnContext::new(mode);
        let draft = Draft::new(mood, BubbleHint::React).lead(line).plain();
        let reply = render(
            draft,
            &ctx,
            &self.lexicon,
            &self.config,
            &mut self.session,
            &mut self.rng,
        );
        self.session.record("", &reply.text);
        reply
    }

    pub fn session(&self) -> &SessionState {
        &self.session
    }

    /// Adopt a previously saved session after checking it against this
    /// engine's catalog.
    pub fn restore_session(&mut self, state: SessionState) -> Result<(), EngineError> {
        state.check_invariants().map_err(EngineError::InvalidSession)?;
        if let Some(name) = &state.active_scene {
            let scene = self
                .catalog
                .scene(name)
                .ok_or_else(|| EngineError::InvalidSession(format!("unknown scene '{name}'")))?;
            if state.active_topic != Some(scene.topic) {
                return Err(EngineError::InvalidSession(format!(
                    "scene '{name}' does not belong to {:?}",
                    state.active_topic
                )));
            }
            let step = scene.step(state.step_index).ok_or_else(|| {
                EngineError::InvalidSession(format!(
                    "scene '{name}' has no step {}",
                    state.step_index
                ))
            })?;
            if let Some(pending) = &state.pending {
                if pending.slot != step.slot || pending.kind != step.kind {
                    return Err(EngineError::InvalidSession(format!(
                        "pending slot '{}' does not match step '{}'",
                        pending.slot, step.slot
                    )));
                }
            }
        }
        self.session = state;
        self.fresh_recall.clear();
        Ok(())
    }

    /// Start over with a fresh session and generator.
    pub fn reset(&mut self, seed: u64) {
        self.session = SessionState::new(&self.config);
        self.rng = StdRng::seed_from_u64(seed);
        self.seed = seed;
        self.fresh_recall.clear();
    }

    pub fn seed(&self) -> u64 {
        self.seed
    }

    pub fn lexicon(&self) -> &Lexicon {
        &self.lexicon
    }

    pub fn catalog(&self) -> &SceneCatalog {
        &self.catalog
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    fn begin_turn(&mut self) {
        self.session.turn += 1;
        self.session.sticky.tick();
        self.distress = false;
    }

    fn finish(&mut self, user_text: &str, draft: Draft, ctx: &TurnContext) -> Reply {
        let reply = render(
            draft,
            ctx,
            &self.lexicon,
            &self.config,
            &mut self.session,
            &mut self.rng,
        );
        for entry in self.fresh_recall.drain(..) {
            self.session.sticky.push(entry);
        }
        self.session.record(user_text, &reply.text);
        if let Err(problem) = self.session.check_invariants() {
            warn!(%problem, "session invariant violated");
            debug_assert!(false, "session invariant violated: {problem}");
            self.session.clear_topic();
        }
        reply
    }

    fn say<F>(&mut self, family: &str, select: F) -> String
    where
        F: Fn(&PhrasePools) -> &[String],
    {
        let pool = select(&self.lexicon.pools);
        self.session
            .phrases
            .pick(family, pool, &mut self.rng)
            .unwrap_or_default()
    }

    fn ack(&mut self, mode: Mode) -> String {
        match mode {
            Mode::Work => self.say("work_ack", |p| &p.work_ack[..]),
            Mode::Chat => {
                let tone = self.session.tone;
                self.say(tone_family(tone), |p| p.ack.get(tone))
            }
        }
    }

    fn menu(&mut self, mode: Mode) -> String {
        match mode {
            Mode::Work => self.say("work_menu", |p| &p.work_menu[..]),
            Mode::Chat => self.say("menu", |p| &p.menu[..]),
        }
    }

    fn continue_prompt(&mut self, mode: Mode) -> String {
        match mode {
            Mode::Work => self.say("work_continue", |p| &p.work_continue[..]),
            Mode::Chat => self.say("continue_prompt", |p| &p.continue_prompt[..]),
        }
    }

    /// The question to repeat after an interjection, if a scene is running.
    /// After a skipped ask nothing was spoken, so the current step's prompt
    /// is asked now and the Pending materialized with it.
    fn reask(&mut self) -> Option<String> {
        let scene_name = self.session.active_scene.clone()?;
        if let Some(pending) = &self.session.pending {
            return Some(pending.last_prompt.clone());
        }
        let topic = self.session.active_topic?;
        let index = self.session.step_index;
        let step = self.catalog.scene(&scene_name)?.step(index)?;
        let prompt = match self.session.last_question.clone() {
            Some(question) => question,
            None => self.session.phrases.pick(
                &format!("prompt.{scene_name}.{index}"),
                &step.prompts,
                &mut self.rng,
            )?,
        };
        self.session.pending = Some(Pending {
            topic,
            slot: step.slot.clone(),
            kind: step.kind,
            scene: scene_name,
            step_index: index,
            retry_count: 0,
            last_prompt: prompt.clone(),
        });
        self.session.last_question = Some(prompt.clone());
        Some(prompt)
    }

    fn on_empty(&mut self, ctx: &TurnContext) -> Draft {
        match self.session.phase {
            Phase::Start => {
                self.session.phase = Phase::Conversation;
                let greeting = if ctx.mascot_name.is_empty() {
                    self.say("greeting", |p| &p.greeting[..])
                } else {
                    self.say("greeting_mascot", |p| &p.greeting_mascot[..])
                        .replace("{mascot}", &ctx.mascot_name)
                };
                let menu = self.menu(ctx.mode);
                info!("conversation started");
                Draft::new(Mood::Happy, BubbleHint::React)
                    .lead(greeting)
                    .question(menu)
                    .plain()
            }
            Phase::Conversation => {
                let line = self.say("listening", |p| &p.listening[..]);
                Draft::new(Mood::Calm, BubbleHint::Ack).lead(line).plain()
            }
        }
    }

    fn on_utterance(&mut self, text: &str, ctx: &TurnContext) -> Draft {
        self.session.phase = Phase::Conversation;
        self.session.intent = infer_intent(text, &self.lexicon);
        self.distress = has_distress(text, &self.lexicon);
        let act = classify(text, &self.lexicon, &self.catalog, &self.config);
        debug!(
            turn = self.session.turn,
            ?act,
            intent = ?self.session.intent,
            distress = self.distress,
            "classified utterance"
        );

        match act {
            Act::Greet | Act::Thanks | Act::Apology | Act::Bye => self.on_social(act, ctx),
            Act::TopicSwitch => self.on_topic_switch(text, ctx),
            _ if self.session.active_scene.is_some() => {
                self.session.tone = infer_tone(self.session.active_topic, self.distress);
                self.on_scene_turn(act, text, ctx)
            }
            _ => self.on_open(act, text, ctx),
        }
    }

    /// Social formulas leave the scene untouched and re-ask whatever is open.
    fn on_social(&mut self, act: Act, ctx: &TurnContext) -> Draft {
        let reask = match act {
            Act::Bye => None,
            _ => self.reask(),
        };
        match act {
            Act::Greet => {
                let lead = self.say("greet_back", |p| &p.greet_back[..]);
                let question = reask.unwrap_or_else(|| self.menu(ctx.mode));
                Draft::new(Mood::Happy, BubbleHint::React)
                    .lead(lead)
                    .question(question)
            }
            Act::Thanks => {
                let lead = self.say("thanks_reply", |p| &p.thanks_reply[..]);
                let draft = Draft::new(Mood::Happy, BubbleHint::React).lead(lead);
                match reask {
                    Some(q) => draft.question(q),
                    None => draft,
                }
            }
            Act::Apology => {
                let lead = self.say("apology_reply", |p| &p.apology_reply[..]);
                let draft = Draft::new(Mood::Calm, BubbleHint::Ack).lead(lead);
                match reask {
                    Some(q) => draft.question(q),
                    None => draft,
                }
            }
            _ => {
                let lead = self.say("bye_reply", |p| &p.bye_reply[..]);
                Draft::new(Mood::Calm, BubbleHint::React).lead(lead).plain()
            }
        }
    }

    fn on_topic_switch(&mut self, text: &str, ctx: &TurnContext) -> Draft {
        info!(from = ?self.session.active_scene, "topic switch");
        self.session.clear_topic();
        self.session.tone = infer_tone(None, self.distress);
        let ack = self.say("switch_ack", |p| &p.switch_ack[..]);
        let norm = normalize(text);
        match self.catalog.match_topic(&norm) {
            Some(topic) => self.enter_topic(topic, &norm, Some(ack), ctx),
            None => {
                let menu = self.menu(ctx.mode);
                Draft::new(Mood::Neutral, BubbleHint::React)
                    .lead(ack)
                    .question(menu)
            }
        }
    }

    /// No scene is running: pick a topic, continue the last one, or offer
    /// the menu.
    fn on_open(&mut self, act: Act, text: &str, ctx: &TurnContext) -> Draft {
        let norm = normalize(text);
        match (act, self.session.active_topic) {
            (Act::Confused, _) => {
                self.session.tone = Tone::Calm;
                let lead = self.say("confused_lead", |p| &p.confused_lead[..]);
                let menu = self.menu(ctx.mode);
                Draft::new(Mood::Calm, BubbleHint::React)
                    .lead(lead)
                    .question(menu)
            }
            (Act::Affirm, Some(topic)) => self.enter_topic(topic, &norm, None, ctx),
            (Act::Deny, Some(topic)) => {
                info!(?topic, "topic declined");
                self.session.clear_topic();
                self.session.tone = Tone::Calm;
                let lead = self.say("deny_lead", |p| &p.deny_lead[..]);
                let menu = self.menu(ctx.mode);
                Draft::new(Mood::Calm, BubbleHint::Ack)
                    .lead(lead)
                    .question(menu)
            }
            _ => match self.catalog.match_topic(&norm) {
                Some(topic) => self.enter_topic(topic, &norm, None, ctx),
                None => {
                    self.session.tone = infer_tone(self.session.active_topic, self.distress);
                    let lead = self.ack(ctx.mode);
                    let menu = self.menu(ctx.mode);
                    Draft::new(self.session.tone.mood(), BubbleHint::Ack)
                        .lead(lead)
                        .question(menu)
                }
            },
        }
    }

    fn enter_topic(
        &mut self,
        topic: Topic,
        norm: &str,
        lead: Option<String>,
        ctx: &TurnContext,
    ) -> Draft {
        let completed = &self.session.completed_scenes;
        let chosen = self
            .catalog
            .choose_scene(topic, norm, &|name: &str| completed.contains(name))
            .map(|scene| scene.name.clone());
        match chosen {
            Some(name) => self.start_scene(&name, lead, ctx),
            None => {
                warn!(?topic, "topic has no scene");
                self.degrade(ctx)
            }
        }
    }

    /// Enter a scene: speak its entry line and step 0's question. No
    /// Pending is set; the next utterance answers step 0 implicitly.
    fn start_scene(&mut self, name: &str, lead: Option<String>, ctx: &TurnContext) -> Draft {
        let Some(scene) = self.catalog.scene(name) else {
            warn!(scene = name, "unknown scene");
            return self.degrade(ctx);
        };
        let topic = scene.topic;
        self.session.tone = infer_tone(Some(topic), self.distress);
        let entry = self
            .session
            .phrases
            .pick(&format!("entry.{name}"), &scene.entry, &mut self.rng)
            .unwrap_or_default();
        let question = match scene.steps.first() {
            Some(step) => {
                self.session
                    .phrases
                    .pick(&format!("prompt.{name}.0"), &step.prompts, &mut self.rng)
            }
            None => None,
        };

        self.session.active_topic = Some(topic);
        self.session.active_scene = Some(name.to_string());
        self.session.step_index = 0;
        self.session.pending = None;
        self.session.last_question = question.clone();
        info!(scene = name, ?topic, "scene started");

        let draft = Draft::new(self.session.tone.mood(), BubbleHint::React);
        let draft = match lead {
            Some(lead) => draft.lead(lead).body(entry),
            None => draft.lead(entry),
        };
        match question {
            Some(q) => draft.question(q),
            None => draft,
        }
    }

    /// Resolve an utterance against the active scene's current step.
    fn on_scene_turn(&mut self, act: Act, text: &str, ctx: &TurnContext) -> Draft {
        let (Some(scene_name), Some(topic)) =
            (self.session.active_scene.clone(), self.session.active_topic)
        else {
            return self.degrade(ctx);
        };
        let index = self.session.step_index;
        let Some(step) = self
            .catalog
            .scene(&scene_name)
            .and_then(|scene| scene.step(index))
            .cloned()
        else {
            warn!(scene = %scene_name, index, "no step at index");
            return self.degrade(ctx);
        };

        // Without a Pending (after an entry prompt or a skipped ask) the
        // utterance still answers the current step.
        let last_question = self.session.last_question.clone();
        let mut pending = self
            .session
            .pending
            .take()
            .filter(|p| p.scene == scene_name && p.step_index == index)
            .unwrap_or_else(|| Pending {
                topic,
                scene: scene_name.clone(),
                slot: step.slot.clone(),
                kind: step.kind,
                step_index: index,
                retry_count: 0,
                last_prompt: last_question
                    .or_else(|| step.prompts.first().cloned())
                    .unwrap_or_default(),
            });

        let soft_cap = self.config.soft_retry_cap;
        match act {
            Act::Confused => {
                pending.retry_count = (pending.retry_count + 1).min(soft_cap);
                let prompt = self
                    .retry_prompt(step.kind, pending.retry_count)
                    .unwrap_or_else(|| pending.last_prompt.clone());
                let lead = self.say("confused_lead", |p| &p.confused_lead[..]);
                self.session.tone = Tone::Calm;
                self.ask_again(pending, prompt, lead, Mood::Calm, BubbleHint::React)
            }
            Act::Deny if step.kind != AnswerKind::YesNo => {
                pending.retry_count = (pending.retry_count + 1).min(soft_cap);
                let kind = step.kind;
                let prompt = self.say(&format!("simple.{}", kind.as_str()), |p| p.simple.get(kind));
                let lead = self.say("deny_lead", |p| &p.deny_lead[..]);
                self.session.tone = Tone::Calm;
                self.ask_again(pending, prompt, lead, Mood::Calm, BubbleHint::Ack)
            }
            _ if is_side_talk(text, step.kind, &self.lexicon, &self.config) => {
                debug!(slot = %pending.slot, "side talk, re-asking");
                let lead = self.say("digression_ack", |p| &p.digression_ack[..]);
                let prompt = pending.last_prompt.clone();
                let mood = self.session.tone.mood();
                self.ask_again(pending, prompt, lead, mood, BubbleHint::Ack)
            }
            _ => match resolve_answer(&step, text, &self.lexicon, &self.config) {
                Some(value) => self.accept_answer(pending, &step, value, ctx),
                None => self.on_mismatch(pending, &step, ctx),
            },
        }
    }

    /// Retry phrasing chosen by retry index, not sampled.
    fn retry_prompt(&self, kind: AnswerKind, retry_count: u8) -> Option<String> {
        let pool = self.lexicon.pools.retry.get(kind);
        if pool.is_empty() {
            return None;
        }
        let index = usize::from(retry_count.max(1) - 1) % pool.len();
        pool.get(index).cloned()
    }

    fn ask_again(
        &mut self,
        mut pending: Pending,
        prompt: String,
        lead: String,
        mood: Mood,
        bubble: BubbleHint,
    ) -> Draft {
        pending.last_prompt = prompt.clone();
        self.session.last_question = Some(prompt.clone());
        self.session.pending = Some(pending);
        Draft::new(mood, bubble).lead(lead).question(prompt)
    }

    fn accept_answer(
        &mut self,
        pending: Pending,
        step: &Step,
        value: String,
        ctx: &TurnContext,
    ) -> Draft {
        let topic = pending.topic;
        self.session.slots.set(topic, &step.slot, &value);
        debug!(scene = %pending.scene, slot = %step.slot, value = %value, "slot filled");

        if step.kind.is_memorable() && value.chars().count() <= self.config.recall_max_chars {
            self.fresh_recall.push(StickyEntry {
                slot: step.slot.clone(),
                value: value.clone(),
                topic,
                ttl: self.config.sticky_ttl,
                used: false,
            });
        }

        if let Some(rule) = step
            .branch
            .iter()
            .find(|rule| branch_fires(&rule.when, &value, &self.lexicon))
        {
            info!(from = %pending.scene, to = %rule.target, slot = %step.slot, "branch");
            return self.start_scene(&rule.target, Some(rule.line.clone()), ctx);
        }

        let lead = match self.confirm(step, &value, ctx.mode) {
            Some(line) => line,
            None => self.ack(ctx.mode),
        };
        self.advance(lead, false, ctx)
    }

    /// Echo a short accepted answer back ("「土曜」だね、了解。").
    fn confirm(&mut self, step: &Step, value: &str, mode: Mode) -> Option<String> {
        if mode == Mode::Work
            || !step.kind.is_confirmable()
            || value.chars().count() > self.config.recall_max_chars
        {
            return None;
        }
        let line = self.say("confirm", |p| &p.confirm[..]);
        (!line.is_empty()).then(|| line.replace("{value}", value))
    }

    /// Retries exhausted leave the slot unset; otherwise re-ask with the
    /// retry phrasing for the new count.
    fn on_mismatch(&mut self, mut pending: Pending, step: &Step, ctx: &TurnContext) -> Draft {
        pending.retry_count = pending.retry_count.saturating_add(1);
        if pending.retry_count >= self.config.max_retries {
            warn!(
                scene = %pending.scene,
                slot = %pending.slot,
                retries = pending.retry_count,
                "retries exhausted, moving on"
            );
            let lead = self.say("giveup_ack", |p| &p.giveup_ack[..]);
            return self.advance(lead, true, ctx);
        }
        debug!(slot = %pending.slot, retries = pending.retry_count, "answer kind mismatch");
        let prompt = self
            .retry_prompt(step.kind, pending.retry_count)
            .unwrap_or_else(|| pending.last_prompt.clone());
        let lead = self.ack(ctx.mode);
        let mood = self.session.tone.mood();
        self.ask_again(pending, prompt, lead, mood, BubbleHint::Ack)
    }

    /// Move past the current step: close the scene after the last step,
    /// otherwise ask the next question or, sometimes, just nod.
    fn advance(&mut self, lead: String, force_ask: bool, ctx: &TurnContext) -> Draft {
        self.session.pending = None;
        let (Some(scene_name), Some(topic)) =
            (self.session.active_scene.clone(), self.session.active_topic)
        else {
            return self.degrade(ctx);
        };
        let Some(scene) = self.catalog.scene(&scene_name) else {
            return self.degrade(ctx);
        };
        let next = self.session.step_index + 1;
        let Some(step) = scene.step(next) else {
            return self.close_scene(lead, ctx);
        };
        let is_final = scene.is_final_step(next);
        self.session.step_index = next;

        if !force_ask && !is_final && self.rng.gen_bool(self.config.skip_ask_rate) {
            debug!(scene = %scene_name, step = next, "skipping the ask");
            self.session.last_question = None;
            let filler = self
                .session
                .phrases
                .pick("filler", &self.lexicon.pools.filler, &mut self.rng)
                .unwrap_or_default();
            return Draft::new(self.session.tone.mood(), BubbleHint::Ack).lead(filler);
        }

        let prompt = self
            .session
            .phrases
            .pick(&format!("prompt.{scene_name}.{next}"), &step.prompts, &mut self.rng)
            .unwrap_or_default();
        self.session.pending = Some(Pending {
            topic,
            scene: scene_name.clone(),
            slot: step.slot.clone(),
            kind: step.kind,
            step_index: next,
            retry_count: 0,
            last_prompt: prompt.clone(),
        });
        self.session.last_question = Some(prompt.clone());
        Draft::new(self.session.tone.mood(), BubbleHint::Ack)
            .lead(lead)
            .question(prompt)
    }

    fn close_scene(&mut self, lead: String, ctx: &TurnContext) -> Draft {
        let scene = self.session.active_scene.clone().unwrap_or_default();
        self.session.completed_scenes.insert(scene.clone());
        self.session.clear_scene();

        let style = closing_style(self.session.intent, self.session.active_topic);
        let closing = self.say(closing_family(style), |p| p.closing.get(style));
        let question = self.continue_prompt(ctx.mode);
        info!(scene = %scene, ?style, "scene closed");

        let mood = match style {
            ClosingStyle::Playful => Mood::Happy,
            ClosingStyle::Soft | ClosingStyle::Forward => self.session.tone.mood(),
        };
        Draft::new(mood, BubbleHint::React)
            .lead(lead)
            .body(closing)
            .question(question)
    }

    /// Last resort when state and catalog disagree: forget the position and
    /// offer the menu.
    fn degrade(&mut self, ctx: &TurnContext) -> Draft {
        warn!(turn = self.session.turn, "degraded turn, showing the topic menu");
        self.session.clear_topic();
        let menu = self.menu(ctx.mode);
        Draft::new(Mood::Neutral, BubbleHint::Ack).question(menu)
    }
}

impl DialogueEngineBuilder {
    pub fn seed(mut self, seed: u64) -> Self {
        self.seed = seed;
        self
    }

    /// Directory holding `lexicon.ron` and `scenes.ron`. Missing files fall
    /// back to the built-in tables.
    pub fn data_dir(mut self, path: &str) -> Self {
        self.data_dir = Some(PathBuf::from(path));
        self
    }

    pub fn config_file(mut self, path: &str) -> Self {
        self.config_file = Some(PathBuf::from(path));
        self
    }

    /// Provide a lexicon directly (for testing without files).
    pub fn with_lexicon(mut self, lexicon: Lexicon) -> Self {
        self.lexicon = Some(lexicon);
        self
    }

    /// Provide a catalog directly (for testing without files).
    pub fn with_catalog(mut self, catalog: SceneCatalog) -> Self {
        self.catalog = Some(catalog);
        self
    }

    pub fn with_config(mut self, config: EngineConfig) -> Self {
        self.config = Some(config);
        self
    }

    pub fn build(self) -> Result<DialogueEngine, EngineError> {
        let lexicon = match (self.lexicon, &self.data_dir) {
            (Some(lexicon), _) => lexicon,
            (None, Some(dir)) if dir.join("lexicon.ron").exists() => {
                Lexicon::load_from_ron(&dir.join("lexicon.ron"))?
            }
            (None, _) => Lexicon::builtin()?,
        };
        let catalog = match (self.catalog, &self.data_dir) {
            (Some(catalog), _) => catalog,
            (None, Some(dir)) if dir.join("scenes.ron").exists() => {
                SceneCatalog::load_from_ron(&dir.join("scenes.ron"))?
            }
            (None, _) => SceneCatalog::builtin()?,
        };
        let config = match (self.config, &self.config_file) {
            (Some(config), _) => config,
            (None, Some(path)) => EngineConfig::load_from_ron(path)?,
            (None, None) => EngineConfig::default(),
        };

        lexicon.validate()?;
        catalog.validate()?;
        config.validate()?;
        for warning in catalog.lint() {
            warn!(%warning, "catalog lint");
        }

        let session = SessionState::new(&config);
        Ok(DialogueEngine {
            lexicon,
            catalog,
            config,
            session,
            rng: StdRng::seed_from_u64(self.seed),
            seed: self.seed,
            distress: false,
            fresh_recall: Vec::new(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn engine() -> DialogueEngine {
        DialogueEngine::builder().seed(42).build().unwrap()
    }

    fn chat() -> TurnContext {
        TurnContext::default()
    }

    #[test]
    fn greeting_then_listening() {
        let mut engine = engine();
        let first = engine.step("", &chat());
        assert_eq!(engine.session().phase, Phase::Conversation);
        assert!(engine
            .lexicon()
            .pools
            .greeting
            .iter()
            .any(|g| first.text.starts_with(g.as_str())));
        let second = engine.step("", &chat());
        assert_ne!(first.text, second.text);
        assert!(engine.lexicon().pools.listening.contains(&second.text));
    }

    #[test]
    fn mascot_name_in_greeting() {
        let mut engine = engine();
        let ctx = TurnContext::default().with_mascot_name("まるもち");
        let reply = engine.step("", &ctx);
        assert!(reply.text.contains("まるもち"), "{}", reply.text);
    }

    #[test]
    fn bye_changes_nothing() {
        let mut engine = engine();
        engine.step("週末どこか行きたい", &chat());
        let before = engine.session().active_scene.clone();
        let reply = engine.step("またね", &chat());
        assert_eq!(engine.session().active_scene, before);
        assert!(engine.lexicon().pools.bye_reply.contains(&reply.text));
    }

    #[test]
    fn greet_mid_scene_reasks_question() {
        let mut engine = engine();
        engine.step("週末どこか行きたい", &chat());
        let question = engine.session().last_question.clone().unwrap();
        let reply = engine.step("こんにちは", &chat());
        assert!(reply.text.contains(&question), "{}", reply.text);
    }

    #[test]
    fn unknown_scene_is_an_error() {
        let mut engine = engine();
        let err = engine.begin_scene("plan-moon", &chat()).unwrap_err();
        assert!(matches!(err, EngineError::UnknownScene(name) if name == "plan-moon"));
    }

    #[test]
    fn mode_notice_lines() {
        let mut engine = engine();
        let work = engine.mode_notice(Mode::Work);
        assert_eq!(work.text, "仕事モードです。集中します。");
        assert_eq!(work.mood, Mood::Serious);
        let chat = engine.mode_notice(Mode::Chat);
        assert_eq!(chat.text, "雑談モードにしました。気楽に話しましょう。");
    }

    #[test]
    fn restore_rejects_unknown_scene() {
        let mut engine = engine();
        let mut state = engine.session().clone();
        state.active_topic = Some(Topic::Plan);
        state.active_scene = Some("plan-moon".to_string());
        let err = engine.restore_session(state).unwrap_err();
        assert!(matches!(err, EngineError::InvalidSession(_)));
    }

    #[test]
    fn restore_round_trips_through_ron() {
        let mut engine = engine();
        engine.step("週末どこか行きたい", &chat());
        let saved = ron::to_string(engine.session()).unwrap();
        let state: SessionState = ron::from_str(&saved).unwrap();
        let mut other = DialogueEngine::builder().seed(7).build().unwrap();
        other.restore_session(state).unwrap();
        assert_eq!(other.session().active_scene.as_deref(), Some("plan-weekend"));
    }

    #[test]
    fn reset_clears_session() {
        let mut engine = engine();
        engine.step("週末どこか行きたい", &chat());
        engine.reset(5);
        assert_eq!(engine.session().turn, 0);
        assert!(engine.session().active_topic.is_none());
        assert_eq!(engine.seed(), 5);
    }

    #[test]
    fn invalid_config_fails_build() {
        let config = EngineConfig {
            skip_ask_rate: 2.0,
            ..EngineConfig::default()
        };
        let result = DialogueEngine::builder().with_config(config).build();
        assert!(matches!(result, Err(EngineError::Config(_))));
    }
}
