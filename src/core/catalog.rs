/// Scene catalog: topic routing tables and the scripted scenes they open.

use serde::{Deserialize, Serialize};
use std::collections::{HashMap, HashSet};
use std::path::Path;
use thiserror::Error;

use crate::schema::act::{AnswerKind, Topic};
use crate::schema::scene::{BranchTest, Scene, Step, TopicEntry};

const BUILTIN_SCENES: &str = include_str!("../../dialogue_data/ja/scenes.ron");

#[derive(Debug, Error)]
pub enum CatalogError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("RON deserialization error: {0}")]
    Ron(#[from] ron::error::SpannedError),
    #[error("invalid catalog: {}", .0.join("; "))]
    Invalid(Vec<String>),
}

/// On-disk shape. Scene names and topics are implied by the map key.
#[derive(Debug, Deserialize)]
struct RonCatalog {
    version: u32,
    topics: Vec<TopicEntry>,
    scenes: HashMap<String, RonScene>,
}

#[derive(Debug, Deserialize)]
struct RonScene {
    entry: Vec<String>,
    steps: Vec<Step>,
}

/// All topics (in matching priority) and every scene they can reach.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SceneCatalog {
    pub version: u32,
    pub topics: Vec<TopicEntry>,
    pub scenes: HashMap<String, Scene>,
}

impl SceneCatalog {
    /// The Japanese catalog shipped with the crate.
    pub fn builtin() -> Result<SceneCatalog, CatalogError> {
        Self::parse_ron(BUILTIN_SCENES)
    }

    /// Load a catalog from a RON file.
    pub fn load_from_ron(path: &Path) -> Result<SceneCatalog, CatalogError> {
        let contents = std::fs::read_to_string(path)?;
        Self::parse_ron(&contents)
    }

    /// Parse a catalog from a RON string.
    ///
    /// A scene whose name has no known topic prefix is rejected here, since
    /// its topic could never be re-derived after a branch.
    pub fn parse_ron(input: &str) -> Result<SceneCatalog, CatalogError> {
        let raw: RonCatalog = ron::from_str(input)?;
        let mut scenes = HashMap::new();
        let mut problems = Vec::new();

        for (name, ron_scene) in raw.scenes {
            let Some(topic) = Topic::from_scene_name(&name) else {
                problems.push(format!("scene '{name}' has no topic prefix"));
                continue;
            };
            scenes.insert(
                name.clone(),
                Scene {
                    name,
                    topic,
                    entry: ron_scene.entry,
                    steps: ron_scene.steps,
                },
            );
        }

        if !problems.is_empty() {
            problems.sort();
            return Err(CatalogError::Invalid(problems));
        }

        let mut topics = raw.topics;
        for entry in &mut topics {
            for trigger in &mut entry.triggers {
                *trigger = trigger.trim().to_lowercase();
            }
            for variant in &mut entry.variants {
                for keyword in &mut variant.keywords {
                    *keyword = keyword.trim().to_lowercase();
                }
            }
        }

        Ok(SceneCatalog {
            version: raw.version,
            topics,
            scenes,
        })
    }

    pub fn scene(&self, name: &str) -> Option<&Scene> {
        self.scenes.get(name)
    }

    pub fn topic_entry(&self, topic: Topic) -> Option<&TopicEntry> {
        self.topics.iter().find(|t| t.topic == topic)
    }

    /// First topic, in priority order, whose trigger appears in `text`.
    /// Expects normalized (lowercased) input.
    pub fn match_topic(&self, text: &str) -> Option<Topic> {
        self.topics
            .iter()
            .find(|entry| entry.triggers.iter().any(|k| text.contains(k.as_str())))
            .map(|entry| entry.topic)
    }

    /// Pick a scene within `topic`: the first variant whose keyword appears,
    /// else the topic default. When nothing in the text narrows it down,
    /// scenes not yet completed this session are preferred.
    pub fn choose_scene(
        &self,
        topic: Topic,
        text: &str,
        completed: &dyn Fn(&str) -> bool,
    ) -> Option<&Scene> {
        let entry = self.topic_entry(topic)?;
        if let Some(variant) = entry
            .variants
            .iter()
            .find(|v| v.keywords.iter().any(|k| text.contains(k.as_str())))
        {
            return self.scene(&variant.scene);
        }
        if completed(&entry.default_scene) {
            let fresh = entry
                .variants
                .iter()
                .map(|v| v.scene.as_str())
                .find(|name| !completed(name));
            if let Some(name) = fresh {
                return self.scene(name);
            }
        }
        self.scene(&entry.default_scene)
    }

    /// Structural errors that would leave the engine unable to run a scene.
    pub fn validate(&self) -> Result<(), CatalogError> {
        let mut problems = Vec::new();

        let mut seen_topics = HashSet::new();
        for entry in &self.topics {
            if !seen_topics.insert(entry.topic) {
                problems.push(format!("topic {:?} is listed twice", entry.topic));
            }
            if entry.triggers.is_empty() {
                problems.push(format!("topic {:?} has no triggers", entry.topic));
            }
            let refs = std::iter::once(&entry.default_scene)
                .chain(entry.variants.iter().map(|v| &v.scene));
            for name in refs {
                match self.scene(name) {
                    None => problems.push(format!(
                        "topic {:?} references unknown scene '{name}'",
                        entry.topic
                    )),
                    Some(scene) if scene.topic != entry.topic => problems.push(format!(
                        "topic {:?} references scene '{name}' of topic {:?}",
                        entry.topic, scene.topic
                    )),
                    Some(_) => {}
                }
            }
        }
        for topic in Topic::ALL {
            if !seen_topics.contains(&topic) {
                problems.push(format!("topic {topic:?} has no routing entry"));
            }
        }

        for scene in self.scenes.values() {
            let name = &scene.name;
            if scene.entry.is_empty() {
                problems.push(format!("scene '{name}' has no entry phrasing"));
            }
            if scene.steps.is_empty() {
                problems.push(format!("scene '{name}' has no steps"));
            }
            let mut slots = HashSet::new();
            for step in &scene.steps {
                let slot = &step.slot;
                if !slots.insert(slot.as_str()) {
                    problems.push(format!("scene '{name}' repeats slot '{slot}'"));
                }
                if step.prompts.is_empty() {
                    problems.push(format!("scene '{name}' slot '{slot}' has no prompts"));
                }
                if step.kind == AnswerKind::Choice && step.choices.is_empty() {
                    problems.push(format!(
                        "scene '{name}' slot '{slot}' is a choice step without choices"
                    ));
                }
                for rule in &step.branch {
                    if self.scene(&rule.target).is_none() {
                        problems.push(format!(
                            "scene '{name}' slot '{slot}' branches to unknown scene '{}'",
                            rule.target
                        ));
                    }
                    if rule.target == *name {
                        problems.push(format!("scene '{name}' branches to itself"));
                    }
                    match &rule.when {
                        BranchTest::Yes | BranchTest::No if step.kind != AnswerKind::YesNo => {
                            problems.push(format!(
                                "scene '{name}' slot '{slot}' uses a yes/no branch on a {:?} step",
                                step.kind
                            ));
                        }
                        BranchTest::ContainsAny(words) if words.is_empty() => {
                            problems.push(format!(
                                "scene '{name}' slot '{slot}' has an empty ContainsAny branch"
                            ));
                        }
                        _ => {}
                    }
                }
            }
        }

        if problems.is_empty() {
            Ok(())
        } else {
            problems.sort();
            Err(CatalogError::Invalid(problems))
        }
    }

    /// Non-fatal findings: triggers that can never win because a
    /// higher-priority topic's trigger is contained in them, and scenes
    /// nothing routes or branches to.
    pub fn lint(&self) -> Vec<String> {
        let mut warnings = Vec::new();

        for (i, entry) in self.topics.iter().enumerate() {
            for trigger in &entry.triggers {
                let shadow = self.topics[..i].iter().find_map(|earlier| {
                    earlier
                        .triggers
                        .iter()
                        .find(|k| trigger.contains(k.as_str()))
                        .map(|k| (earlier.topic, k))
                });
                if let Some((topic, k)) = shadow {
                    warnings.push(format!(
                        "trigger '{trigger}' of {:?} is shadowed by '{k}' of {topic:?}",
                        entry.topic
                    ));
                }
            }
        }

        let mut reachable: HashSet<&str> = HashSet::new();
        for entry in &self.topics {
            reachable.insert(entry.default_scene.as_str());
            reachable.extend(entry.variants.iter().map(|v| v.scene.as_str()));
        }
        for scene in self.scenes.values() {
            for step in &scene.steps {
                reachable.extend(step.branch.iter().map(|r| r.target.as_str()));
            }
        }
        let mut unreachable: Vec<&str> = self
            .scenes
            .keys()
            .map(String::as_str)
            .filter(|name| !reachable.contains(name))
            .collect();
        unreachable.sort();
        for name in unreachable {
            warnings.push(format!("scene '{name}' is unreachable"));
        }

        warnings
    }
}
