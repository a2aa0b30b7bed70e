//! Scenario setup: the immutable document a session is built from
//!
//! A scenario names the setting, the player's mission and the NPC personas.
//! Generation is delegated to a [`ScenarioGenerator`]; the trait is
//! contracted to never fail, falling back to [`default_scenario`] so the
//! engine can assume generation always succeeds.

use crate::providers::{ChatMessage, Provider};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::warn;

/// One NPC persona in a scenario
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ActorSpec {
    /// Character name, unique within the scenario
    pub name: String,
    /// Personality description driving the character's voice
    #[serde(default)]
    pub personality: String,
    /// Private goal the character pursues
    #[serde(default)]
    pub mission: Option<String>,
    /// Backstory consistent with the setting
    #[serde(default)]
    pub background: Option<String>,
    /// How the character is present in the opening scene
    #[serde(default)]
    pub scene_presence: Option<String>,
}

/// Complete scenario document
///
/// Immutable once a session is built from it; persisted verbatim as the
/// game's `config_json`.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ScenarioSetup {
    /// Scenario title
    #[serde(default)]
    pub title: String,
    /// One-line pitch
    #[serde(default)]
    pub short_description: String,
    /// Setting description
    #[serde(default)]
    pub setting: String,
    /// The problem the scene revolves around
    #[serde(default)]
    pub problem_context: String,
    /// Why the player matters in this scene
    #[serde(default)]
    pub player_relevance: String,
    /// The player's win condition
    #[serde(default)]
    pub player_mission: String,
    /// Narration shown before the first turn
    #[serde(default)]
    pub opening_narrative: String,
    /// NPC personas; must be non-empty to build a session
    #[serde(default)]
    pub actors: Vec<ActorSpec>,
}

impl ScenarioSetup {
    /// Actor names with blank entries filtered out, in declaration order
    pub fn actor_names(&self) -> Vec<String> {
        self.actors
            .iter()
            .map(|a| a.name.trim().to_string())
            .filter(|n| !n.is_empty())
            .collect()
    }
}

/// Generates a scenario from an optional theme
///
/// Contracted to never fail: on internal failure implementations return
/// [`default_scenario`] rather than propagate.
#[async_trait]
pub trait ScenarioGenerator: Send + Sync {
    /// Produces a scenario with roughly `actor_count` NPC personas
    async fn generate(&self, theme: Option<&str>, actor_count: usize) -> ScenarioSetup;
}

/// Built-in fallback scenario with placeholder actors
pub fn default_scenario() -> ScenarioSetup {
    ScenarioSetup {
        title: "The Crossroads Inn".to_string(),
        short_description: "A storm strands travelers at a remote inn; one of them hides a secret."
            .to_string(),
        setting: "A candle-lit roadside inn on a stormy night, far from the nearest town."
            .to_string(),
        problem_context: "The bridge ahead has washed out and nobody can leave until morning."
            .to_string(),
        player_relevance: "You are the only traveler the innkeeper trusts with the cellar key."
            .to_string(),
        player_mission: "Find out which guest is lying about why they are here.".to_string(),
        opening_narrative:
            "Rain hammers the shutters as you push open the inn's heavy door. Two strangers \
             look up from the fire."
                .to_string(),
        actors: vec![
            ActorSpec {
                name: "Maren".to_string(),
                personality: "Warm but watchful innkeeper who misses nothing.".to_string(),
                mission: Some("Keep the peace under her roof at any cost.".to_string()),
                background: Some("Has run the inn alone since the last war.".to_string()),
                scene_presence: Some("Drying mugs behind the bar.".to_string()),
            },
            ActorSpec {
                name: "Corvin".to_string(),
                personality: "Charming courier with too-smooth answers.".to_string(),
                mission: Some("Leave before dawn without being searched.".to_string()),
                background: Some("Carries a sealed satchel he never sets down.".to_string()),
                scene_presence: Some("Sitting closest to the fire, boots still muddy.".to_string()),
            },
        ],
    }
}

/// LLM-backed generator producing a scenario as structured JSON
pub struct LlmScenarioGenerator {
    provider: Arc<dyn Provider>,
}

impl LlmScenarioGenerator {
    /// Creates a generator backed by the given provider
    pub fn new(provider: Arc<dyn Provider>) -> Self {
        Self { provider }
    }

    fn build_prompt(theme: Option<&str>, actor_count: usize) -> String {
        let theme_line = theme
            .map(|t| format!("Theme: {t}"))
            .unwrap_or_else(|| "Theme: pick something evocative".to_string());
        format!(
            "Design a role-play scenario for one human player and {actor_count} NPC characters.\n\
             {theme_line}\n\n\
             Respond ONLY with a JSON object with these exact keys:\n\
             {{\n\
               \"title\": string,\n\
               \"short_description\": string,\n\
               \"setting\": string,\n\
               \"problem_context\": string,\n\
               \"player_relevance\": string,\n\
               \"player_mission\": string,\n\
               \"opening_narrative\": string,\n\
               \"actors\": [{{\"name\": string, \"personality\": string, \"mission\": string, \
             \"background\": string, \"scene_presence\": string}}]\n\
             }}"
        )
    }
}

#[async_trait]
impl ScenarioGenerator for LlmScenarioGenerator {
    async fn generate(&self, theme: Option<&str>, actor_count: usize) -> ScenarioSetup {
        let messages = vec![
            ChatMessage::system(
                "You are a scenario writer for a narrative role-play engine. \
                 You respond only with valid JSON.",
            ),
            ChatMessage::user(Self::build_prompt(theme, actor_count)),
        ];
        match self.provider.complete(&messages).await {
            Ok(text) => match crate::providers::extract_json(&text)
                .and_then(|v| serde_json::from_value::<ScenarioSetup>(v).ok())
            {
                Some(setup) if !setup.actor_names().is_empty() => setup,
                _ => {
                    warn!("scenario generation returned unusable JSON, using default scenario");
                    default_scenario()
                }
            },
            Err(e) => {
                warn!("scenario generation failed ({e:#}), using default scenario");
                default_scenario()
            }
        }
    }
}

/// Generator that always returns a fixed setup, for tests and standard games
pub struct FixedScenarioGenerator {
    setup: ScenarioSetup,
}

impl FixedScenarioGenerator {
    /// Wraps a fixed setup
    pub fn new(setup: ScenarioSetup) -> Self {
        Self { setup }
    }
}

#[async_trait]
impl ScenarioGenerator for FixedScenarioGenerator {
    async fn generate(&self, _theme: Option<&str>, _actor_count: usize) -> ScenarioSetup {
        self.setup.clone()
    }
}
