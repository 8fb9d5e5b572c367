//! Settings merger
//!
//! Combines archive settings into current settings one top-level field at
//! a time. Scalar/object fields accept `replace` or `none`; the
//! provider-profile list additionally accepts `append`, which regenerates
//! each incoming profile id before concatenating so nothing collides.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use crate::error::{CoreError, Result};
use crate::id::ProfileId;
use crate::settings::{Settings, SettingsField};

/// Per-field merge strategy
///
/// Unset fields default to `None` — keep whatever the store already has.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MergeStrategy {
    Replace,
    Append,
    #[default]
    None,
}

/// Strategy selection for a whole merge
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SettingsMergeSpec {
    pub fields: BTreeMap<SettingsField, MergeStrategy>,
    pub provider_profiles: MergeStrategy,
}

impl SettingsMergeSpec {
    /// Replace every field and the profile list
    pub fn replace_all() -> Self {
        Self {
            fields: SettingsField::ALL
                .into_iter()
                .map(|field| (field, MergeStrategy::Replace))
                .collect(),
            provider_profiles: MergeStrategy::Replace,
        }
    }
}

/// Produce the settings to persist after an import
pub fn merge_settings(
    current: Option<Settings>,
    incoming: Settings,
    spec: &SettingsMergeSpec,
) -> Result<Settings> {
    let mut merged = current.unwrap_or_default();

    for field in SettingsField::ALL {
        match spec.fields.get(&field).copied().unwrap_or_default() {
            MergeStrategy::None => {}
            MergeStrategy::Replace => field.copy_from(&mut merged, &incoming),
            // Rejected loudly: silently ignoring it would hide a caller bug
            MergeStrategy::Append => {
                return Err(CoreError::InvalidMergeStrategy {
                    field: field.as_str().to_string(),
                });
            }
        }
    }

    match spec.provider_profiles {
        MergeStrategy::None => {}
        MergeStrategy::Replace => merged.provider_profiles = incoming.provider_profiles,
        MergeStrategy::Append => {
            merged
                .provider_profiles
                .extend(incoming.provider_profiles.into_iter().map(|mut profile| {
                    profile.id = ProfileId::generate();
                    profile
                }));
        }
    }

    Ok(merged)
}
