use serde::{Deserialize, Serialize};
use uuid::Uuid;

#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    Serialize,
    Deserialize,
    strum::Display,
    strum::EnumString,
    strum::AsRefStr,
)]
#[strum(serialize_all = "lowercase")]
#[serde(rename_all = "lowercase")]
pub enum Theme {
    Light,
    Dark,
    Auto,
}

/// Display preferences, 1:1 with a user. Created lazily with defaults on
/// first read. `font_size` is a level from 1 to 5, not a pixel value.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct UserPreferences {
    #[serde(skip_serializing)]
    pub user_id: Uuid,
    pub font_size: i16,
    pub theme: Theme,
}

impl UserPreferences {
    pub fn defaults(user_id: Uuid) -> Self {
        Self {
            user_id,
            font_size: 2,
            theme: Theme::Auto,
        }
    }
}
