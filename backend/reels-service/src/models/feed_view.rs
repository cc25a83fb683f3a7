//! Response shape for a reel in a feed page.
//!
//! The builder assembles a fixed struct and projects requested fields by
//! intersecting against the struct's known keys. Unknown field names are
//! logged and skipped; there is no reflection over arbitrary attributes.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use tracing::warn;
use uuid::Uuid;

use super::{ProductFacts, Reel};

/// Full reel payload for feed responses.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FeedReel {
    pub reel_id: Uuid,
    pub merchant_id: Uuid,
    pub product_id: Uuid,
    pub description: String,
    pub video_url: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub thumbnail_url: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub duration_seconds: Option<i32>,
    pub views_count: i64,
    pub likes_count: i64,
    pub shares_count: i64,
    pub created_at: DateTime<Utc>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub category_id: Option<Uuid>,
    pub is_liked: bool,
}

/// Field names a caller may request via `?fields=`.
const KNOWN_FIELDS: &[&str] = &[
    "reel_id",
    "merchant_id",
    "product_id",
    "description",
    "video_url",
    "thumbnail_url",
    "duration_seconds",
    "views_count",
    "likes_count",
    "shares_count",
    "created_at",
    "category_id",
    "is_liked",
];

impl FeedReel {
    pub fn build(reel: &Reel, facts: Option<&ProductFacts>, is_liked: bool) -> Self {
        Self {
            reel_id: reel.id,
            merchant_id: reel.merchant_id,
            product_id: reel.product_id,
            description: reel.description.clone(),
            video_url: reel.video_url.clone(),
            thumbnail_url: reel.thumbnail_url.clone(),
            duration_seconds: reel.duration_seconds,
            views_count: reel.views_count,
            likes_count: reel.likes_count,
            shares_count: reel.shares_count,
            created_at: reel.created_at,
            category_id: facts.and_then(|f| f.category_id),
            is_liked,
        }
    }

    /// Serialize, keeping only the requested fields. `None` keeps all.
    pub fn project(&self, fields: Option<&[String]>) -> Value {
        let full = serde_json::to_value(self).unwrap_or(Value::Null);

        let requested = match fields {
            Some(fields) if !fields.is_empty() => fields,
            _ => return full,
        };

        let invalid: Vec<&str> = requested
            .iter()
            .map(String::as_str)
            .filter(|f| !KNOWN_FIELDS.contains(f))
            .collect();
        if !invalid.is_empty() {
            warn!(fields = ?invalid, "ignoring unknown feed fields");
        }

        match full {
            Value::Object(map) => {
                let projected: Map<String, Value> = map
                    .into_iter()
                    .filter(|(k, _)| requested.iter().any(|f| f == k))
                    .collect();
                Value::Object(projected)
            }
            other => other,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample() -> FeedReel {
        FeedReel {
            reel_id: Uuid::new_v4(),
            merchant_id: Uuid::new_v4(),
            product_id: Uuid::new_v4(),
            description: "spring collection".to_string(),
            video_url: "https://cdn.example.com/r.mp4".to_string(),
            thumbnail_url: Some("https://cdn.example.com/r.jpg".to_string()),
            duration_seconds: Some(42),
            views_count: 10,
            likes_count: 3,
            shares_count: 1,
            created_at: Utc::now(),
            category_id: Some(Uuid::new_v4()),
            is_liked: true,
        }
    }

    #[test]
    fn test_project_all_fields_by_default() {
        let view = sample();
        let value = view.project(None);
        let obj = value.as_object().unwrap();
        assert!(obj.contains_key("video_url"));
        assert!(obj.contains_key("is_liked"));
    }

    #[test]
    fn test_project_subset() {
        let view = sample();
        let fields = vec!["reel_id".to_string(), "likes_count".to_string()];
        let value = view.project(Some(&fields));
        let obj = value.as_object().unwrap();
        assert_eq!(obj.len(), 2);
        assert!(obj.contains_key("reel_id"));
        assert!(obj.contains_key("likes_count"));
    }

    #[test]
    fn test_project_ignores_unknown_fields() {
        let view = sample();
        let fields = vec!["reel_id".to_string(), "password".to_string()];
        let value = view.project(Some(&fields));
        let obj = value.as_object().unwrap();
        assert_eq!(obj.len(), 1);
        assert!(!obj.contains_key("password"));
    }

    #[test]
    fn test_empty_field_list_keeps_everything() {
        let view = sample();
        let value = view.project(Some(&[]));
        assert!(value.as_object().unwrap().len() > 5);
    }
}
