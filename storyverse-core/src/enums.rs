//! Enum types for the story partition dimensions.
//!
//! Each enum serializes as its display label (`"Disney & Pixar"`, `"2-4 Years"`,
//! `"English"`), which is also the form used inside partition keys. Legacy
//! cache blobs and backups depend on these exact strings.

use crate::ValidationError;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

// ============================================================================
// STORY CATEGORY
// ============================================================================

/// Thematic category of a story.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum StoryCategory {
    #[serde(rename = "Disney & Pixar")]
    Disney,
    #[serde(rename = "Sports & Games")]
    Sports,
    #[serde(rename = "Magic & Fantasy")]
    Magic,
    #[serde(rename = "Space & Robots")]
    Space,
    #[serde(rename = "School & Learning")]
    School,
    #[serde(rename = "Superheroes & Actions")]
    Superheroes,
    #[serde(rename = "Firefighters & Police")]
    Police,
    #[serde(rename = "Family & Friendship")]
    Family,
    #[serde(rename = "Emotions & Feelings")]
    Emotions,
    #[serde(rename = "Bedtime & Relaxation")]
    Bedtime,
    #[serde(rename = "Animals & Dinosaurs")]
    Animals,
    #[serde(rename = "Adventure & Pirates")]
    Adventure,
}

impl StoryCategory {
    /// Every category, in sweep order.
    pub const ALL: [StoryCategory; 12] = [
        StoryCategory::Disney,
        StoryCategory::Sports,
        StoryCategory::Magic,
        StoryCategory::Space,
        StoryCategory::School,
        StoryCategory::Superheroes,
        StoryCategory::Police,
        StoryCategory::Family,
        StoryCategory::Emotions,
        StoryCategory::Bedtime,
        StoryCategory::Animals,
        StoryCategory::Adventure,
    ];

    /// Convert to database string representation.
    pub fn as_db_str(&self) -> &'static str {
        match self {
            Self::Disney => "Disney & Pixar",
            Self::Sports => "Sports & Games",
            Self::Magic => "Magic & Fantasy",
            Self::Space => "Space & Robots",
            Self::School => "School & Learning",
            Self::Superheroes => "Superheroes & Actions",
            Self::Police => "Firefighters & Police",
            Self::Family => "Family & Friendship",
            Self::Emotions => "Emotions & Feelings",
            Self::Bedtime => "Bedtime & Relaxation",
            Self::Animals => "Animals & Dinosaurs",
            Self::Adventure => "Adventure & Pirates",
        }
    }

    /// Parse from database string representation.
    pub fn from_db_str(s: &str) -> Result<Self, ValidationError> {
        Self::ALL
            .into_iter()
            .find(|c| c.as_db_str() == s)
            .ok_or_else(|| ValidationError::UnknownValue {
                kind: "category",
                value: s.to_string(),
            })
    }

    /// Short lowercase name accepted on the command line.
    pub fn slug(&self) -> &'static str {
        match self {
            Self::Disney => "disney",
            Self::Sports => "sports",
            Self::Magic => "magic",
            Self::Space => "space",
            Self::School => "school",
            Self::Superheroes => "superheroes",
            Self::Police => "police",
            Self::Family => "family",
            Self::Emotions => "emotions",
            Self::Bedtime => "bedtime",
            Self::Animals => "animals",
            Self::Adventure => "adventure",
        }
    }

    pub fn description(&self) -> &'static str {
        match self {
            Self::Disney => "Magical kingdoms and animated friends.",
            Self::Sports => "Games, teamwork, and active fun.",
            Self::Magic => "Wizards, spells, and mythical creatures.",
            Self::Space => "Intergalactic journeys and friendly robots.",
            Self::School => "Classroom adventures and learning new things.",
            Self::Superheroes => "Saving the day with super powers.",
            Self::Police => "Heroes who keep us safe every day.",
            Self::Family => "Love, caring, and being together.",
            Self::Emotions => "Understanding feelings and moods.",
            Self::Bedtime => "Calm stories for a good night's sleep.",
            Self::Animals => "Tales about dinosaurs and furry friends.",
            Self::Adventure => "Treasure hunts and sea voyages.",
        }
    }
}

impl fmt::Display for StoryCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_db_str())
    }
}

impl FromStr for StoryCategory {
    type Err = ValidationError;

    /// Accepts either the display label or the slug (case-insensitive).
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let needle = s.trim();
        Self::ALL
            .into_iter()
            .find(|c| c.as_db_str() == needle || c.slug().eq_ignore_ascii_case(needle))
            .ok_or_else(|| ValidationError::UnknownValue {
                kind: "category",
                value: s.to_string(),
            })
    }
}

// ============================================================================
// AGE BRACKET
// ============================================================================

/// Target reader age range. Drives prompt guidelines.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum AgeBracket {
    #[serde(rename = "2-4 Years")]
    Toddler,
    #[serde(rename = "5-7 Years")]
    EarlyGrade,
    #[serde(rename = "7+ Years")]
    OlderKid,
}

impl AgeBracket {
    pub const ALL: [AgeBracket; 3] = [AgeBracket::Toddler, AgeBracket::EarlyGrade, AgeBracket::OlderKid];

    pub fn as_db_str(&self) -> &'static str {
        match self {
            Self::Toddler => "2-4 Years",
            Self::EarlyGrade => "5-7 Years",
            Self::OlderKid => "7+ Years",
        }
    }

    pub fn from_db_str(s: &str) -> Result<Self, ValidationError> {
        Self::ALL
            .into_iter()
            .find(|a| a.as_db_str() == s)
            .ok_or_else(|| ValidationError::UnknownValue {
                kind: "age bracket",
                value: s.to_string(),
            })
    }

    pub fn slug(&self) -> &'static str {
        match self {
            Self::Toddler => "toddler",
            Self::EarlyGrade => "early",
            Self::OlderKid => "older",
        }
    }

    /// Friendly label for listings.
    pub fn label(&self) -> &'static str {
        match self {
            Self::Toddler => "Toddlers (2-4)",
            Self::EarlyGrade => "Kids (5-7)",
            Self::OlderKid => "Big Kids (7+)",
        }
    }
}

impl fmt::Display for AgeBracket {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_db_str())
    }
}

impl FromStr for AgeBracket {
    type Err = ValidationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let needle = s.trim();
        Self::ALL
            .into_iter()
            .find(|a| a.as_db_str() == needle || a.slug().eq_ignore_ascii_case(needle))
            .ok_or_else(|| ValidationError::UnknownValue {
                kind: "age bracket",
                value: s.to_string(),
            })
    }
}

// ============================================================================
// LANGUAGE
// ============================================================================

/// Language the story is written in.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum Language {
    English,
    French,
    Arabic,
}

impl Language {
    pub const ALL: [Language; 3] = [Language::English, Language::French, Language::Arabic];

    pub fn as_db_str(&self) -> &'static str {
        match self {
            Self::English => "English",
            Self::French => "French",
            Self::Arabic => "Arabic",
        }
    }

    pub fn from_db_str(s: &str) -> Result<Self, ValidationError> {
        Self::ALL
            .into_iter()
            .find(|l| l.as_db_str() == s)
            .ok_or_else(|| ValidationError::UnknownValue {
                kind: "language",
                value: s.to_string(),
            })
    }

    /// Two-letter code accepted on the command line.
    pub fn code(&self) -> &'static str {
        match self {
            Self::English => "en",
            Self::French => "fr",
            Self::Arabic => "ar",
        }
    }

    pub fn flag(&self) -> &'static str {
        match self {
            Self::English => "🇬🇧",
            Self::French => "🇫🇷",
            Self::Arabic => "🇸🇦",
        }
    }
}

impl fmt::Display for Language {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_db_str())
    }
}

impl FromStr for Language {
    type Err = ValidationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let needle = s.trim();
        Self::ALL
            .into_iter()
            .find(|l| l.as_db_str().eq_ignore_ascii_case(needle) || l.code().eq_ignore_ascii_case(needle))
            .ok_or_else(|| ValidationError::UnknownValue {
                kind: "language",
                value: s.to_string(),
            })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_category_db_str_roundtrip() {
        for category in StoryCategory::ALL {
            assert_eq!(StoryCategory::from_db_str(category.as_db_str()), Ok(category));
        }
    }

    #[test]
    fn test_category_serializes_as_label() {
        let json = serde_json::to_string(&StoryCategory::Police).unwrap();
        assert_eq!(json, "\"Firefighters & Police\"");
        let parsed: StoryCategory = serde_json::from_str("\"Bedtime & Relaxation\"").unwrap();
        assert_eq!(parsed, StoryCategory::Bedtime);
    }

    #[test]
    fn test_age_serializes_as_label() {
        let json = serde_json::to_string(&AgeBracket::OlderKid).unwrap();
        assert_eq!(json, "\"7+ Years\"");
    }

    #[test]
    fn test_from_str_accepts_slugs() {
        assert_eq!("space".parse::<StoryCategory>(), Ok(StoryCategory::Space));
        assert_eq!("SPACE".parse::<StoryCategory>(), Ok(StoryCategory::Space));
        assert_eq!("toddler".parse::<AgeBracket>(), Ok(AgeBracket::Toddler));
        assert_eq!("5-7 Years".parse::<AgeBracket>(), Ok(AgeBracket::EarlyGrade));
        assert_eq!("fr".parse::<Language>(), Ok(Language::French));
        assert_eq!("arabic".parse::<Language>(), Ok(Language::Arabic));
    }

    #[test]
    fn test_from_str_rejects_unknown() {
        let err = "cooking".parse::<StoryCategory>().unwrap_err();
        assert!(err.to_string().contains("cooking"));
        assert!("german".parse::<Language>().is_err());
    }

    #[test]
    fn test_cross_product_sizes() {
        assert_eq!(StoryCategory::ALL.len() * AgeBracket::ALL.len() * Language::ALL.len(), 108);
    }
}
