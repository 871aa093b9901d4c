/// Weekend Chat example: a scripted conversation through the plan topic.
///
/// A mini visit: greeting → weekend plans → a digression → a branch into
/// trip planning → a thank-you → switching to hobbies.
///
/// Run with: cargo run --example weekend_chat

use companion_dialogue::core::config::EngineConfig;
use companion_dialogue::schema::act::Topic;
use companion_dialogue::{DialogueEngine, Mode, TurnContext};

fn main() {
    let config = EngineConfig::load_from_ron(std::path::Path::new("dialogue_data/config.ron"))
        .expect("Failed to load engine config");

    let mut engine = DialogueEngine::builder()
        .seed(2026)
        .data_dir("dialogue_data/ja")
        .with_config(config)
        .build()
        .expect("Failed to build engine");

    let ctx = TurnContext::new(Mode::Chat)
        .with_user_name("ゆき")
        .with_mascot_name("まるもち");

    let script = [
        "",
        "週末どこか行きたいな",
        "え？",
        "そういえば昨日ね、駅前に新しいカフェができてたんだ",
        "旅行に行きたい",
        "京都",
        "来月の連休",
        "お寺めぐり",
        "ありがとう",
        "それより趣味の話",
        "映画",
    ];

    println!("=== Weekend Chat ===\n");
    for line in script {
        let reply = engine.step(line, &ctx);
        if line.is_empty() {
            println!("(widget opens)");
        } else {
            println!("ゆき: {line}");
        }
        println!("まるもち: {}  ({}) [{}]\n", reply.text, reply.bubble, reply.mood.as_str());
    }

    println!("=== Remembered ===");
    if let Some(slots) = engine.session().slots.topic(Topic::Plan) {
        for (slot, value) in slots {
            println!("  plan.{slot} = {value}");
        }
    }
    println!(
        "  completed scenes: {}",
        engine.session().completed_scenes.len()
    );
}
