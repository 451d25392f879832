//! Story document generation.

use async_trait::async_trait;
use piggybook_core::error::ProviderError;
use piggybook_core::provider::StoryGenerator;
use piggybook_core::story::StoryDocument;
use serde_json::{Value, json};
use tracing::instrument;

use crate::client::GeminiClient;
use crate::wire::{GenerateContentRequest, GenerationConfig};

/// Readers this age and older get richer vocabulary and larger sums.
pub const OLDER_READER_AGE: u32 = 10;

/// Builds the story prompt for a reader.
#[must_use]
pub fn story_prompt(age: u32, concept: &str) -> String {
    let rules = if age >= OLDER_READER_AGE {
        "Text can use moderate vocabulary and compound sentences. Numbers can be larger \
         ($1-$100) to introduce real-world pricing concepts."
    } else {
        "Keep text simple, short, and friendly. Numbers should be small ($1-$20)."
    };
    format!(
        "Generate an interactive storybook for Piggy, an AI storybook author.\n\
         Target Age: {age}. Concept: {concept}.\n\
         The main character is Piggy (a pig).\n\n\
         IMPORTANT for \"knowledge_check\":\n\
         - Do NOT ask recall questions about what happened in the story \
         (e.g., \"What did Piggy buy?\").\n\
         - Instead, generate \"What would YOU do?\" scenarios relevant to the child's \
         life but related to the concept.\n\
         - Scenarios should cover real-life situations like spending allowance, buying \
         gifts, saving for a toy, or sharing.\n\
         - Example: \"You have $5 for allowance. You want a toy that costs $4, but your \
         friend's birthday is tomorrow. What do you do?\"\n\
         - Ensure choices illustrate the financial concept clearly.\n\
         - Every correct_answer must equal the id of one of its choices.\n\n\
         Follow the exact JSON format requested in the instructions.\n\
         {rules}"
    )
}

/// JSON schema the provider is asked to answer in.
#[must_use]
pub fn story_schema() -> Value {
    let string = json!({ "type": "STRING" });
    json!({
        "type": "OBJECT",
        "properties": {
            "book": {
                "type": "OBJECT",
                "properties": {
                    "title": string,
                    "concept": string,
                    "age_band": string,
                    "pages": {
                        "type": "ARRAY",
                        "items": {
                            "type": "OBJECT",
                            "properties": {
                                "page_number": { "type": "INTEGER" },
                                "image_prompt": string,
                                "text": string
                            },
                            "required": ["page_number", "image_prompt", "text"]
                        }
                    }
                },
                "required": ["title", "concept", "age_band", "pages"]
            },
            "piggy_intro": {
                "type": "OBJECT",
                "properties": { "text": string },
                "required": ["text"]
            },
            "piggy_recap": {
                "type": "OBJECT",
                "properties": {
                    "summary": { "type": "ARRAY", "items": string },
                    "lesson": string
                },
                "required": ["summary", "lesson"]
            },
            "knowledge_check": {
                "type": "ARRAY",
                "items": {
                    "type": "OBJECT",
                    "properties": {
                        "question": string,
                        "choices": {
                            "type": "ARRAY",
                            "items": {
                                "type": "OBJECT",
                                "properties": { "id": string, "text": string },
                                "required": ["id", "text"]
                            }
                        },
                        "correct_answer": string,
                        "explanation": string
                    },
                    "required": ["question", "choices", "correct_answer", "explanation"]
                }
            },
            "piggy_interaction_rules": {
                "type": "OBJECT",
                "properties": {
                    "style": string,
                    "allowed_topics": string,
                    "redirect_rule": string
                }
            }
        },
        "required": ["book", "piggy_intro", "piggy_recap", "knowledge_check"]
    })
}

/// Parses the JSON text the provider returned.
///
/// # Errors
///
/// Returns `ProviderError::InvalidResponse` when the text is not a story
/// document.
pub fn parse_story(text: &str) -> Result<StoryDocument, ProviderError> {
    serde_json::from_str(text)
        .map_err(|e| ProviderError::InvalidResponse(format!("story document: {e}")))
}

/// [`StoryGenerator`] over Gemini structured output.
#[derive(Debug, Clone)]
pub struct GeminiStoryGenerator {
    client: GeminiClient,
}

impl GeminiStoryGenerator {
    /// Creates a story generator over `client`.
    #[must_use]
    pub fn new(client: GeminiClient) -> Self {
        Self { client }
    }
}

#[async_trait]
impl StoryGenerator for GeminiStoryGenerator {
    #[instrument(skip(self, concept))]
    async fn generate_story(
        &self,
        age: u32,
        concept: &str,
    ) -> Result<StoryDocument, ProviderError> {
        let request =
            GenerateContentRequest::text(story_prompt(age, concept)).with_config(GenerationConfig {
                response_mime_type: Some("application/json".to_owned()),
                response_schema: Some(story_schema()),
                ..GenerationConfig::default()
            });
        let response = self
            .client
            .generate_content(&self.client.config().story_model, &request)
            .await?;
        let text = response
            .text()
            .ok_or_else(|| ProviderError::InvalidResponse("story response has no text".to_owned()))?;
        parse_story(&text)
    }
}

#[cfg(test)]
mod tests {
    use piggybook_test_support::sample_story;

    use super::*;

    #[test]
    fn test_young_readers_get_small_numbers() {
        let prompt = story_prompt(7, "Saving");
        assert!(prompt.contains("Target Age: 7. Concept: Saving."));
        assert!(prompt.contains("($1-$20)"));
        assert!(!prompt.contains("($1-$100)"));
    }

    #[test]
    fn test_readers_from_ten_get_real_world_prices() {
        assert!(story_prompt(10, "Budgeting").contains("($1-$100)"));
        assert!(story_prompt(9, "Budgeting").contains("($1-$20)"));
    }

    #[test]
    fn test_schema_requires_the_document_sections() {
        let schema = story_schema();
        assert_eq!(
            schema["required"],
            json!(["book", "piggy_intro", "piggy_recap", "knowledge_check"])
        );
        assert_eq!(
            schema["properties"]["book"]["properties"]["pages"]["items"]["properties"]["page_number"]
                ["type"],
            "INTEGER"
        );
    }

    #[test]
    fn test_provider_json_parses_into_a_document() {
        let text = serde_json::to_string(&sample_story(3)).unwrap();
        assert_eq!(parse_story(&text).unwrap(), sample_story(3));
    }

    #[test]
    fn test_truncated_json_is_an_invalid_response() {
        assert!(matches!(
            parse_story("{\"book\": {"),
            Err(ProviderError::InvalidResponse(_))
        ));
    }
}
