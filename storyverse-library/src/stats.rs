//! Library statistics.

use serde::Serialize;
use storyverse_core::{PartitionMap, StoryCategory};

use crate::service::has_generated_content;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct CategoryCount {
    pub category: StoryCategory,
    pub stories: usize,
}

/// Counts over the whole library.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct LibraryStats {
    /// One entry per category, in display order, zero when empty.
    pub per_category: Vec<CategoryCount>,
    pub total: usize,
    /// Stories whose full text has been generated.
    pub full_stories: usize,
    pub covers: usize,
}

impl LibraryStats {
    pub fn compute(partitions: &PartitionMap) -> Self {
        let mut per_category: Vec<CategoryCount> = StoryCategory::ALL
            .iter()
            .map(|&category| CategoryCount { category, stories: 0 })
            .collect();
        let mut total = 0;
        let mut full_stories = 0;
        let mut covers = 0;

        for (key, stories) in partitions {
            if let Some(entry) = per_category.iter_mut().find(|c| c.category == key.category) {
                entry.stories += stories.len();
            }
            total += stories.len();
            full_stories += stories.iter().filter(|s| has_generated_content(s)).count();
            covers += stories.iter().filter(|s| s.has_cover()).count();
        }

        Self {
            per_category,
            total,
            full_stories,
            covers,
        }
    }

    pub fn count_for(&self, category: StoryCategory) -> usize {
        self.per_category
            .iter()
            .find(|c| c.category == category)
            .map_or(0, |c| c.stories)
    }
}
