use serde::{Deserialize, Serialize};

use crate::reader::Validate;

/// One corpus entry. Never mutated once read.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Article {
    pub id: String,
    pub title: String,
    #[serde(rename = "media-type")]
    pub media_type: MediaType,
    pub content: String,
}

impl Article {
    /// Only news articles are admitted into extraction.
    pub fn is_news(&self) -> bool {
        self.media_type == MediaType::News
    }
}

impl Validate for Article {
    fn validate(&self) -> Result<(), String> {
        if self.id.trim().is_empty() {
            return Err("article id is empty".to_string());
        }
        Ok(())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum MediaType {
    News,
    Other(String),
}

impl From<String> for MediaType {
    fn from(value: String) -> Self {
        match value.as_str() {
            "News" => MediaType::News,
            _ => MediaType::Other(value),
        }
    }
}

impl From<MediaType> for String {
    fn from(value: MediaType) -> Self {
        match value {
            MediaType::News => "News".to_string(),
            MediaType::Other(other) => other,
        }
    }
}
