use serde::{Deserialize, Serialize};

/// Adobe Stock's fixed category list, offered to the model verbatim.
pub const ADOBE_STOCK_CATEGORIES: &[&str] = &[
    "Animals",
    "Buildings and Architecture",
    "Business",
    "Drinks",
    "The Environment",
    "States of Mind",
    "Food",
    "Graphic Resources",
    "Hobbies and Leisure",
    "Industry",
    "Landscapes",
    "Lifestyle",
    "People",
    "Plants and Flowers",
    "Culture and Religion",
    "Science",
    "Social Issues",
    "Sports",
    "Technology",
    "Transport",
    "Travel",
];

/// Fields the model is asked to return. All three are required; anything
/// else in the response is ignored.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct MetadataFields {
    pub title: String,
    pub keywords: Vec<String>,
    pub category: String,
}

/// Metadata attached to an item once it succeeds.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct GeneratedMetadata {
    pub file_name: String,
    pub title: String,
    /// Ordered by relevance, as returned.
    pub keywords: Vec<String>,
    pub category: String,
}

impl GeneratedMetadata {
    pub fn new(file_name: impl Into<String>, fields: MetadataFields) -> Self {
        Self {
            file_name: file_name.into(),
            title: fields.title,
            keywords: fields.keywords,
            category: fields.category,
        }
    }
}
