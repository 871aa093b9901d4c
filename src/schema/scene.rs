/// Scene catalog entities: topics, scripted scenes, steps, and branch rules.

use serde::{Deserialize, Serialize};

use super::act::{AnswerKind, Topic};

/// A scripted mini-conversation: an ordered list of steps, each asking for
/// one slot.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Scene {
    pub name: String,
    pub topic: Topic,
    /// Spoken once when the scene is entered, before step 0's question.
    pub entry: Vec<String>,
    pub steps: Vec<Step>,
}

impl Scene {
    pub fn step(&self, index: usize) -> Option<&Step> {
        self.steps.get(index)
    }

    pub fn is_final_step(&self, index: usize) -> bool {
        index + 1 >= self.steps.len()
    }
}

/// One question within a scene.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Step {
    pub slot: String,
    pub kind: AnswerKind,
    /// Alternative phrasings of the question; one is sampled per ask.
    pub prompts: Vec<String>,
    /// Offered options for `Choice` steps.
    #[serde(default)]
    pub choices: Vec<String>,
    /// Evaluated in order against the accepted answer; the first that fires
    /// redirects to its target scene.
    #[serde(default)]
    pub branch: Vec<BranchRule>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BranchRule {
    pub when: BranchTest,
    /// Bridging line spoken before the target scene's entry.
    pub line: String,
    pub target: String,
}

/// Predicate over an accepted slot value.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum BranchTest {
    ContainsAny(Vec<String>),
    Yes,
    No,
}

/// Routing data for one topic: what triggers it and which scene it opens.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TopicEntry {
    pub topic: Topic,
    /// Short name used in menus and transcripts.
    pub label: String,
    pub triggers: Vec<String>,
    #[serde(default)]
    pub variants: Vec<SceneVariant>,
    pub default_scene: String,
}

/// A scene selected within a topic when one of its keywords appears.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SceneVariant {
    pub scene: String,
    pub keywords: Vec<String>,
}
