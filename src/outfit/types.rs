use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// Fashion attributes the tagging prompt asks for, in prompt order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TagKey {
    Colors,
    GarmentType,
    Style,
    Fabric,
    Length,
    Occasion,
    Fit,
    Keywords,
}

impl TagKey {
    pub const ALL: [TagKey; 8] = [
        TagKey::Colors,
        TagKey::GarmentType,
        TagKey::Style,
        TagKey::Fabric,
        TagKey::Length,
        TagKey::Occasion,
        TagKey::Fit,
        TagKey::Keywords,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            TagKey::Colors => "colors",
            TagKey::GarmentType => "garment_type",
            TagKey::Style => "style",
            TagKey::Fabric => "fabric",
            TagKey::Length => "length",
            TagKey::Occasion => "occasion",
            TagKey::Fit => "fit",
            TagKey::Keywords => "keywords",
        }
    }

    pub fn parse(key: &str) -> Option<Self> {
        let normalized = key.trim().to_ascii_lowercase();
        TagKey::ALL
            .into_iter()
            .find(|candidate| candidate.as_str() == normalized)
    }
}

/// Tags extracted from one outfit image. Keys iterate in [`TagKey`] order.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct OutfitTagSet {
    tags: BTreeMap<TagKey, String>,
}

fn tag_value_text(value: &Value) -> Option<String> {
    let text = match value {
        Value::String(text) => text.trim().to_string(),
        Value::Number(number) => number.to_string(),
        Value::Bool(flag) => flag.to_string(),
        Value::Array(items) => items
            .iter()
            .filter_map(tag_value_text)
            .collect::<Vec<_>>()
            .join(", "),
        Value::Null | Value::Object(_) => return None,
    };
    if text.is_empty() {
        None
    } else {
        Some(text)
    }
}

impl OutfitTagSet {
    #[cfg(test)]
    pub fn new() -> Self {
        Self::default()
    }

    /// Keeps the known keys of a model-produced object, dropping everything
    /// that cannot be shown as a short string.
    pub fn from_json_object(object: &Map<String, Value>) -> Self {
        let mut tags = BTreeMap::new();
        for (key, value) in object {
            let Some(tag_key) = TagKey::parse(key) else {
                continue;
            };
            if let Some(text) = tag_value_text(value) {
                tags.insert(tag_key, text);
            }
        }
        Self { tags }
    }

    #[cfg(test)]
    pub fn with_tag(mut self, key: TagKey, value: impl Into<String>) -> Self {
        let value = value.into();
        if !value.trim().is_empty() {
            self.tags.insert(key, value.trim().to_string());
        }
        self
    }

    pub fn get(&self, key: TagKey) -> Option<&str> {
        self.tags.get(&key).map(|value| value.as_str())
    }

    pub fn is_empty(&self) -> bool {
        self.tags.is_empty()
    }

    pub fn len(&self) -> usize {
        self.tags.len()
    }

    pub fn iter(&self) -> impl Iterator<Item = (TagKey, &str)> {
        self.tags.iter().map(|(key, value)| (*key, value.as_str()))
    }

    /// `key: value` pairs joined by commas.
    pub fn render(&self) -> String {
        self.iter()
            .map(|(key, value)| format!("{}: {}", key.as_str(), value))
            .collect::<Vec<_>>()
            .join(", ")
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProductListing {
    pub title: String,
    pub price: f64,
    pub site: String,
    pub url: String,
}

#[derive(Debug, Clone)]
pub struct SearchRequest {
    pub outfit_description: String,
    pub extra_filters: String,
    pub budget: u32,
    pub candidate_sites: Vec<String>,
    pub image_tags: Option<OutfitTagSet>,
}

impl SearchRequest {
    pub fn has_tags(&self) -> bool {
        self.image_tags
            .as_ref()
            .map(|tags| !tags.is_empty())
            .unwrap_or(false)
    }

    /// A search needs either a description or at least one image tag.
    pub fn has_subject(&self) -> bool {
        !self.outfit_description.trim().is_empty() || self.has_tags()
    }

    pub fn combined_description(&self) -> String {
        let mut combined = self.outfit_description.clone();
        if let Some(tags) = self.image_tags.as_ref().filter(|tags| !tags.is_empty()) {
            combined.push_str("\nImage tags: ");
            combined.push_str(&tags.render());
        }
        combined
    }
}
