//! Application settings record
//!
//! Settings are a flat record plus an ordered list of provider profiles.
//! The backup engine merges them field-by-field (see
//! [`crate::backup::merge_settings`]), so every top-level field here is a
//! unit of merge granularity.

use serde::{Deserialize, Serialize};

use crate::id::ProfileId;

/// UI theme selection
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum Theme {
    #[default]
    System,
    Light,
    Dark,
}

/// Default sampling parameters applied to new chats
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
#[serde(rename_all = "camelCase", default)]
pub struct GenerationDefaults {
    pub temperature: Option<f32>,
    pub top_p: Option<f32>,
    pub max_output_tokens: Option<u32>,
}

/// A configured model provider endpoint
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProviderProfile {
    pub id: ProfileId,
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub base_url: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub model_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub api_key: Option<String>,
}

/// The application settings record
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
#[serde(rename_all = "camelCase", default)]
pub struct Settings {
    pub theme: Theme,
    pub language: Option<String>,
    pub default_model_id: Option<String>,
    pub system_prompt: Option<String>,
    pub generation: GenerationDefaults,
    pub provider_profiles: Vec<ProviderProfile>,
}

/// The top-level settings fields subject to per-field merging
///
/// `provider_profiles` is handled separately by the merger because it
/// supports the additional `append` strategy.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SettingsField {
    Theme,
    Language,
    DefaultModelId,
    SystemPrompt,
    Generation,
}

impl SettingsField {
    pub const ALL: [SettingsField; 5] = [
        SettingsField::Theme,
        SettingsField::Language,
        SettingsField::DefaultModelId,
        SettingsField::SystemPrompt,
        SettingsField::Generation,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            SettingsField::Theme => "theme",
            SettingsField::Language => "language",
            SettingsField::DefaultModelId => "default_model_id",
            SettingsField::SystemPrompt => "system_prompt",
            SettingsField::Generation => "generation",
        }
    }

    /// Copy this field's value from `incoming` into `target`
    pub(crate) fn copy_from(&self, target: &mut Settings, incoming: &Settings) {
        match self {
            SettingsField::Theme => target.theme = incoming.theme,
            SettingsField::Language => target.language = incoming.language.clone(),
            SettingsField::DefaultModelId => {
                target.default_model_id = incoming.default_model_id.clone()
            }
            SettingsField::SystemPrompt => target.system_prompt = incoming.system_prompt.clone(),
            SettingsField::Generation => target.generation = incoming.generation.clone(),
        }
    }
}
