use axum::Json;
use serde::Serialize;

use mindmirror_types::activities::{CatalogActivity, PREDEFINED_ACTIVITIES};
use mindmirror_types::emotions::{CoreEmotion, EMOTION_HIERARCHY, all_emotion_words};

/// The static vocabulary clients build their pickers from: the emotion
/// hierarchy with its display colors, the flattened word list, and the
/// predefined activity catalog. Public; there is nothing per-user in it.
#[derive(Debug, Serialize)]
pub struct CatalogResponse {
    pub emotions: &'static [CoreEmotion],
    pub mood_words: &'static [&'static str],
    pub activities: &'static [CatalogActivity],
}

pub async fn get_catalog() -> Json<CatalogResponse> {
    Json(CatalogResponse {
        emotions: &EMOTION_HIERARCHY,
        mood_words: all_emotion_words(),
        activities: &PREDEFINED_ACTIVITIES,
    })
}
