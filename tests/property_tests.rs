/// Seeded random walks over a fixed vocabulary. Every turn of every walk
/// must leave the session structurally sound; a failure names its seed.

use companion_dialogue::core::session::{StickyEntry, StickyQueue};
use companion_dialogue::schema::act::Topic;
use companion_dialogue::{DialogueEngine, Mode, TurnContext};
use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use rand::{Rng, SeedableRng};

const VOCABULARY: &[&str] = &[
    "",
    "こんにちは",
    "ありがとう",
    "ごめん",
    "またね",
    "え？",
    "どういうこと？",
    "うん",
    "はい",
    "いいえ",
    "ううん",
    "週末どこか行きたい",
    "旅行に行きたい",
    "疲れた",
    "頭痛がひどい",
    "上司とうまくいかない",
    "どっちを買うか迷う",
    "推しのライブ",
    "映画",
    "明日の朝",
    "近所の公園",
    "楽しい",
    "のんびりかな",
    "わからない",
    "あんまり眠れてない",
    "そういえば昨日ね",
    "もう最悪！！",
    "それより趣味の話",
    "別の話にしよう",
    "ねこ",
    "今日は朝から晩まで会議が続いていて、昼ごはんも食べられなかったし、帰りの電車も遅れていて本当に大変な一日だった",
];

const WALKS: u64 = 40;
const TURNS: usize = 60;

fn context(rng: &mut StdRng) -> TurnContext {
    let mode = if rng.gen_bool(0.2) { Mode::Work } else { Mode::Chat };
    let name = ["", "ゆき", "  "].choose(rng).copied().unwrap_or("");
    TurnContext::new(mode)
        .with_user_name(name)
        .with_mascot_name("まるもち")
}

#[test]
fn random_walks_keep_session_sound() {
    for seed in 0..WALKS {
        let mut input_rng = StdRng::seed_from_u64(seed ^ 0x5eed);
        let mut engine = DialogueEngine::builder().seed(seed).build().unwrap();
        let max_retries = engine.config().max_retries;
        let sticky_capacity = engine.config().sticky_capacity;

        for turn in 0..TURNS {
            let text = VOCABULARY.choose(&mut input_rng).copied().unwrap_or("");
            let ctx = context(&mut input_rng);
            let reply = engine.step(text, &ctx);
            let session = engine.session();
            let at = format!("seed {seed} turn {turn} input {text:?}");

            if let Err(problem) = session.check_invariants() {
                panic!("{at}: {problem}");
            }
            // A pending question always sits inside an active scene.
            if let Some(pending) = &session.pending {
                assert!(session.active_scene.is_some(), "{at}");
                assert!(pending.retry_count < max_retries, "{at}");
                assert_eq!(Topic::from_scene_name(&pending.scene), Some(pending.topic), "{at}");
            }
            assert!(session.sticky.len() <= sticky_capacity, "{at}");
            assert!(session.sticky.iter().all(|e| e.ttl >= 1), "{at}");
            assert!(session.recent_responses.len() <= 2, "{at}");
            assert!(!reply.text.is_empty(), "{at}");
            assert!(!reply.bubble.is_empty(), "{at}");
            assert_ne!(reply.text, reply.bubble, "{at}");
        }
    }
}

#[test]
fn random_walks_are_reproducible() {
    for seed in [3, 17, 256] {
        let run = || {
            let mut input_rng = StdRng::seed_from_u64(seed);
            let mut engine = DialogueEngine::builder().seed(seed).build().unwrap();
            (0..TURNS)
                .map(|_| {
                    let text = VOCABULARY.choose(&mut input_rng).copied().unwrap_or("");
                    let ctx = context(&mut input_rng);
                    engine.step(text, &ctx)
                })
                .collect::<Vec<_>>()
        };
        assert_eq!(run(), run(), "seed {seed}");
    }
}

#[test]
fn sticky_queue_bounds_hold_under_random_use() {
    for seed in 0..WALKS {
        let mut rng = StdRng::seed_from_u64(seed);
        let capacity = rng.gen_range(1..=3);
        let mut queue = StickyQueue::new(capacity);
        for i in 0..200 {
            match rng.gen_range(0..3) {
                0 => queue.push(StickyEntry {
                    slot: format!("slot{i}"),
                    value: format!("v{i}"),
                    topic: Topic::Hobby,
                    ttl: rng.gen_range(0..=4),
                    used: false,
                }),
                1 => queue.tick(),
                _ => {
                    queue.take_unused();
                }
            }
            assert!(queue.len() <= capacity, "seed {seed} op {i}");
            assert!(queue.iter().all(|e| e.ttl >= 1), "seed {seed} op {i}");
        }
    }
}
