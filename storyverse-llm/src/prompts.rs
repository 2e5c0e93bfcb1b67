//! Prompt builders.
//!
//! The age guidelines shape vocabulary, structure, and target length. They
//! are sent to the model as instructions only; nothing checks the output
//! against them afterwards.

use storyverse_core::{AgeBracket, Language, StoryCategory};

/// Number of stories requested per list.
pub const STORIES_PER_LIST: usize = 10;

/// Writing guidelines for an age bracket.
pub fn age_guidelines(age: AgeBracket) -> &'static str {
    match age {
        AgeBracket::Toddler => {
            "- Word Count: Strictly 300–600 words.
- Vocabulary: Strong and efficient.
- Structure: Use repetition in sentences (repeat key lines across pages so children learn new words and anticipate what comes next). Use rhythm and rhyme. Simple sentences.
- Elements: Include imagery and onomatopoeia (e.g., \"ding dong\", \"woooosh\", \"boom\"). Use descriptive words (adjectives & adverbs) to enhance imagination.
- Pacing: Well-paced storytelling (not too fast, not too slow)."
        }
        AgeBracket::EarlyGrade => {
            "- Word Count: Strictly 600–1,000 words.
- Vocabulary: Strong vocabulary.
- Structure: More complex sentences. Simple dialogue (when needed).
- Elements: Simple problem and solution. Use descriptive words. Relatable storylines and characters. Emotional elements (happy, sad, worried, excited).
- Pacing: Well-paced."
        }
        AgeBracket::OlderKid => {
            "- Word Count: Long and detailed (aim for approx 1500+ words).
- Vocabulary: Strong vocabulary.
- Structure: Complex dialogue and complex sentences.
- Elements: Clear problem and solution. Story must teach a lesson or moral. Emotional elements. Relatable storylines and characters.
- Interaction: Include questions within the text or at the end that the child can answer from clues or personal perspective."
        }
    }
}

pub fn story_list_prompt(category: StoryCategory, age: AgeBracket, language: Language) -> String {
    format!(
        "Generate a list of exactly {count} creative and distinct children's story titles and one-sentence summaries.
Target Audience: {age} old children.
Language: {language}.
Theme: {category}.
Ensure the titles are catchy and the summaries are engaging.",
        count = STORIES_PER_LIST,
    )
}

pub fn full_story_prompt(
    title: &str,
    summary: &str,
    age: AgeBracket,
    language: Language,
    category: StoryCategory,
) -> String {
    format!(
        "Write a complete children's story based on the following metadata:
Title: \"{title}\"
Summary: \"{summary}\"
Target Audience: {age}
Language: {language}.
Category: {category}.

STORY GUIDELINES (STRICTLY FOLLOW):
{guidelines}

General Formatting:
1. Format with clear paragraphs using Markdown.
2. Ensure the tone is appropriate for the category and culture of the language.",
        guidelines = age_guidelines(age),
    )
}

pub fn cover_prompt(title: &str, summary: &str, category: StoryCategory) -> String {
    format!(
        "A beautiful, high-quality children's book cover illustration for a story titled \"{title}\".
Context/Summary: {summary}.
Theme: {category}.
Style: Vibrant digital art, 3D render style similar to Pixar/Disney, soft lighting, highly detailed, 4k.

CRITICAL INSTRUCTION:
DO NOT INCLUDE TEXT.
NO TITLE.
NO WORDS.
NO LETTERS.
The image must be purely artwork with absolutely zero text elements on it."
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_list_prompt_names_parameters() {
        let prompt = story_list_prompt(StoryCategory::Space, AgeBracket::Toddler, Language::Arabic);
        assert!(prompt.contains("exactly 10"));
        assert!(prompt.contains("Target Audience: 2-4 Years old children."));
        assert!(prompt.contains("Language: Arabic."));
        assert!(prompt.contains("Theme: Space & Robots."));
    }

    #[test]
    fn test_full_prompt_embeds_guidelines() {
        let prompt = full_story_prompt(
            "Moon Cat",
            "A cat visits the moon.",
            AgeBracket::OlderKid,
            Language::English,
            StoryCategory::Animals,
        );
        assert!(prompt.contains("Title: \"Moon Cat\""));
        assert!(prompt.contains("1500+ words"));
        assert!(prompt.contains("Markdown"));
    }

    #[test]
    fn test_guidelines_differ_by_age() {
        assert!(age_guidelines(AgeBracket::Toddler).contains("onomatopoeia"));
        assert!(age_guidelines(AgeBracket::EarlyGrade).contains("600–1,000"));
        assert!(age_guidelines(AgeBracket::OlderKid).contains("moral"));
    }

    #[test]
    fn test_cover_prompt_forbids_text() {
        let prompt = cover_prompt("Robo", "A robot.", StoryCategory::Space);
        for line in ["DO NOT INCLUDE TEXT.", "NO TITLE.", "NO WORDS.", "NO LETTERS."] {
            assert!(prompt.contains(line), "missing {}", line);
        }
    }
}
