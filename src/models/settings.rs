use garde::Validate;
use serde::{Deserialize, Serialize};

use crate::models::item::ContentKind;
use crate::models::metadata::ADOBE_STOCK_CATEGORIES;

pub const DEFAULT_TITLE_LENGTH: u32 = 100;
pub const DEFAULT_KEYWORD_COUNT: u32 = 30;

/// Caller-supplied knobs shared by every item in a dispatch round.
#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
pub struct GenerationSettings {
    #[garde(skip)]
    pub content_type: ContentKind,

    /// Target title length in characters. A soft target for the model only.
    #[garde(range(min = 5, max = 200))]
    pub title_length: u32,

    /// Target keyword count. A soft target for the model only.
    #[garde(range(min = 5, max = 50))]
    pub keyword_count: u32,

    #[garde(length(min = 1), inner(length(min = 1)))]
    pub categories: Vec<String>,
}

impl Default for GenerationSettings {
    fn default() -> Self {
        Self {
            content_type: ContentKind::Image,
            title_length: DEFAULT_TITLE_LENGTH,
            keyword_count: DEFAULT_KEYWORD_COUNT,
            categories: ADOBE_STOCK_CATEGORIES.iter().map(|c| c.to_string()).collect(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_validate() {
        let settings = GenerationSettings::default();
        assert_eq!(settings.title_length, 100);
        assert_eq!(settings.keyword_count, 30);
        assert!(settings.validate().is_ok());
    }

    #[test]
    fn test_out_of_range_rejected() {
        let settings = GenerationSettings {
            keyword_count: 80,
            ..GenerationSettings::default()
        };
        assert!(settings.validate().is_err());

        let settings = GenerationSettings {
            title_length: 2,
            ..GenerationSettings::default()
        };
        assert!(settings.validate().is_err());
    }

    #[test]
    fn test_empty_categories_rejected() {
        let settings = GenerationSettings {
            categories: Vec::new(),
            ..GenerationSettings::default()
        };
        assert!(settings.validate().is_err());
    }
}
