/// Catalog integration tests: loading from disk, validation errors, and
/// driving the engine with a non-default catalog.

use companion_dialogue::core::catalog::{CatalogError, SceneCatalog};
use companion_dialogue::core::config::EngineConfig;
use companion_dialogue::schema::act::Topic;
use companion_dialogue::{DialogueEngine, TurnContext};
use std::path::Path;

const FIXTURE: &str = "tests/fixtures/mini_catalog.ron";

fn problems(input: &str) -> Vec<String> {
    let catalog = SceneCatalog::parse_ron(input).unwrap();
    match catalog.validate() {
        Err(CatalogError::Invalid(problems)) => problems,
        other => panic!("expected Invalid, got {other:?}"),
    }
}

#[test]
fn fixture_loads_and_validates() {
    let catalog = SceneCatalog::load_from_ron(Path::new(FIXTURE)).unwrap();
    assert_eq!(catalog.version, 2);
    assert_eq!(catalog.scenes.len(), 6);
    catalog.validate().unwrap();
    assert!(catalog.lint().is_empty(), "{:?}", catalog.lint());
}

#[test]
fn builtin_data_dir_matches_embedded_tables() {
    let from_disk = SceneCatalog::load_from_ron(Path::new("dialogue_data/ja/scenes.ron")).unwrap();
    assert_eq!(from_disk, SceneCatalog::builtin().unwrap());
}

#[test]
fn missing_file_is_io_error() {
    let result = SceneCatalog::load_from_ron(Path::new("tests/fixtures/nope.ron"));
    assert!(matches!(result, Err(CatalogError::Io(_))));
}

#[test]
fn broken_references_are_reported() {
    let input = r#"(
        version: 1,
        topics: [
            (topic: Body, label: "体", triggers: ["頭痛"], default_scene: "plan-day"),
            (topic: Plan, label: "予定", triggers: [], default_scene: "plan-day"),
        ],
        scenes: {
            "plan-day": (
                entry: ["予定だね。"],
                steps: [
                    (
                        slot: "wish",
                        kind: Free,
                        prompts: ["何する？"],
                        branch: [
                            (when: ContainsAny(["旅"]), line: "旅！", target: "plan-moon"),
                            (when: Yes, line: "うん。", target: "plan-day"),
                        ],
                    ),
                    (slot: "pick", kind: Choice, prompts: ["どれ？"]),
                ],
            ),
        },
    )"#;
    let problems = problems(input);
    let has = |needle: &str| problems.iter().any(|p| p.contains(needle));
    assert!(has("references scene 'plan-day' of topic Plan"), "{problems:?}");
    assert!(has("topic Plan has no triggers"), "{problems:?}");
    assert!(has("topic Social has no routing entry"), "{problems:?}");
    assert!(has("unknown scene 'plan-moon'"), "{problems:?}");
    assert!(has("branches to itself"), "{problems:?}");
    assert!(has("yes/no branch on a Free step"), "{problems:?}");
    assert!(has("choice step without choices"), "{problems:?}");
}

#[test]
fn engine_runs_on_fixture_catalog() {
    let catalog = SceneCatalog::load_from_ron(Path::new(FIXTURE)).unwrap();
    let config = EngineConfig {
        skip_ask_rate: 0.0,
        ..EngineConfig::default()
    };
    let mut engine = DialogueEngine::builder()
        .seed(3)
        .with_catalog(catalog)
        .with_config(config)
        .build()
        .unwrap();
    let ctx = TurnContext::default();

    engine.step("頭痛がする", &ctx);
    assert_eq!(engine.session().active_scene.as_deref(), Some("body-head"));
    engine.step("今朝から", &ctx);
    assert_eq!(engine.session().slots.get(Topic::Body, "since"), Some("今朝から"));
    engine.step("いいえ", &ctx);
    assert!(engine.session().active_scene.is_none());
    assert!(engine.session().completed_scenes.contains("body-head"));

    engine.step("別の話で、予定のこと", &ctx);
    assert_eq!(engine.session().active_scene.as_deref(), Some("plan-day"));
    engine.step("旅行したい", &ctx);
    assert_eq!(engine.session().active_scene.as_deref(), Some("plan-trip"));
    assert_eq!(engine.session().slots.get(Topic::Plan, "wish"), Some("旅行したい"));
}

#[test]
fn data_dir_builder_loads_tables() {
    let engine = DialogueEngine::builder()
        .data_dir("dialogue_data/ja")
        .config_file("dialogue_data/config.ron")
        .build()
        .unwrap();
    assert_eq!(engine.catalog().scenes.len(), 14);
    assert_eq!(engine.config(), &EngineConfig::default());
}
