//! The story document model.
//!
//! Field names follow the JSON shape the story provider emits, so a document
//! moves between provider, cache and HTTP clients without any mapping layer.

use serde::{Deserialize, Serialize};

use crate::error::DocumentError;

/// Reference to a generated illustration (a URL or `data:` URI).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ImageRef(pub String);

/// Raw synthesized speech as returned by the speech provider.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AudioBytes(pub Vec<u8>);

/// A complete generated storybook.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StoryDocument {
    /// The book itself.
    pub book: Book,
    /// Narration read before the first page.
    #[serde(rename = "piggy_intro")]
    pub intro: Intro,
    /// Summary shown after the last page.
    #[serde(rename = "piggy_recap")]
    pub recap: Recap,
    /// "What would you do?" scenario questions.
    #[serde(default)]
    pub knowledge_check: Vec<KnowledgeCheckItem>,
    /// Rules for the downstream conversational agent.
    #[serde(rename = "piggy_interaction_rules", default)]
    pub interaction_rules: InteractionRules,
}

/// Title, concept, age band and pages.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Book {
    /// Book title.
    pub title: String,
    /// Financial concept the story teaches.
    pub concept: String,
    /// Target age band as labelled by the provider.
    pub age_band: String,
    /// Pages in reading order.
    pub pages: Vec<Page>,
}

/// One page of the book.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Page {
    /// 1-based page number.
    pub page_number: u32,
    /// Illustration prompt for the image provider.
    pub image_prompt: String,
    /// Narrated page text.
    pub text: String,
    /// Generated illustration, filled lazily.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub image_url: Option<ImageRef>,
}

/// Introductory narration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Intro {
    /// Text to narrate.
    pub text: String,
}

/// End-of-story recap.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Recap {
    /// Summary lines in order.
    pub summary: Vec<String>,
    /// The single lesson line.
    pub lesson: String,
}

/// A labelled answer option.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Choice {
    /// Label referenced by `correct_answer`.
    pub id: String,
    /// Display text.
    pub text: String,
}

/// A scenario question with labelled choices.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct KnowledgeCheckItem {
    /// Scenario question.
    pub question: String,
    /// Options in display order.
    pub choices: Vec<Choice>,
    /// Label of the correct choice.
    pub correct_answer: String,
    /// Shown after answering.
    pub explanation: String,
}

impl KnowledgeCheckItem {
    /// Returns the choice carrying the correct label.
    #[must_use]
    pub fn correct_choice(&self) -> Option<&Choice> {
        self.choices.iter().find(|c| c.id == self.correct_answer)
    }
}

/// Style metadata for the conversational agent that follows the story.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct InteractionRules {
    /// Tone of voice.
    #[serde(default)]
    pub style: String,
    /// Topics the agent may discuss.
    #[serde(default)]
    pub allowed_topics: String,
    /// How to steer off-topic questions back.
    #[serde(default)]
    pub redirect_rule: String,
}

/// Result of [`StoryDocument::attach_image`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ImageAttach {
    /// The page had no image and now has one.
    Attached,
    /// The page already had an image; nothing changed.
    AlreadyPresent,
}

impl StoryDocument {
    /// Checks the structural invariants a provider response must satisfy.
    ///
    /// # Errors
    ///
    /// Returns the first violated invariant: empty page list, page numbers
    /// not running 1..=n, a knowledge check without choices, a repeated
    /// choice label, or a correct answer that names no choice.
    pub fn validate(&self) -> Result<(), DocumentError> {
        if self.book.pages.is_empty() {
            return Err(DocumentError::NoPages);
        }
        for (position, page) in self.book.pages.iter().enumerate() {
            let expected = u32::try_from(position + 1).unwrap_or(u32::MAX);
            if page.page_number != expected {
                return Err(DocumentError::PageOutOfOrder {
                    position,
                    expected,
                    found: page.page_number,
                });
            }
        }

        for (index, item) in self.knowledge_check.iter().enumerate() {
            if item.choices.is_empty() {
                return Err(DocumentError::NoChoices { index });
            }
            for (i, choice) in item.choices.iter().enumerate() {
                if item.choices[..i].iter().any(|c| c.id == choice.id) {
                    return Err(DocumentError::DuplicateChoice {
                        index,
                        choice_id: choice.id.clone(),
                    });
                }
            }
            if item.correct_choice().is_none() {
                return Err(DocumentError::UnknownAnswer {
                    index,
                    answer: item.correct_answer.clone(),
                });
            }
        }
        Ok(())
    }

    /// Returns the page with the given number.
    #[must_use]
    pub fn page(&self, page_number: u32) -> Option<&Page> {
        self.book.pages.iter().find(|p| p.page_number == page_number)
    }

    /// Page numbers that still lack an illustration.
    #[must_use]
    pub fn pages_missing_images(&self) -> Vec<u32> {
        self.book
            .pages
            .iter()
            .filter(|p| p.image_url.is_none())
            .map(|p| p.page_number)
            .collect()
    }

    /// Attaches an illustration to a page. An existing image is never
    /// replaced, and nothing else in the document is touched.
    ///
    /// # Errors
    ///
    /// Returns `DocumentError::PageNotFound` if no page has that number.
    pub fn attach_image(
        &mut self,
        page_number: u32,
        image: ImageRef,
    ) -> Result<ImageAttach, DocumentError> {
        let page = self
            .book
            .pages
            .iter_mut()
            .find(|p| p.page_number == page_number)
            .ok_or(DocumentError::PageNotFound(page_number))?;

        if page.image_url.is_some() {
            return Ok(ImageAttach::AlreadyPresent);
        }
        page.image_url = Some(image);
        Ok(ImageAttach::Attached)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn page(page_number: u32) -> Page {
        Page {
            page_number,
            image_prompt: format!("Piggy on page {page_number}"),
            text: format!("Piggy counts coins on page {page_number}."),
            image_url: None,
        }
    }

    fn question(correct: &str) -> KnowledgeCheckItem {
        KnowledgeCheckItem {
            question: "You have $5. What do you do?".to_owned(),
            choices: vec![
                Choice {
                    id: "A".to_owned(),
                    text: "Save it".to_owned(),
                },
                Choice {
                    id: "B".to_owned(),
                    text: "Spend it all".to_owned(),
                },
            ],
            correct_answer: correct.to_owned(),
            explanation: "Saving helps you reach bigger goals.".to_owned(),
        }
    }

    fn document(pages: u32) -> StoryDocument {
        StoryDocument {
            book: Book {
                title: "Piggy Saves Up".to_owned(),
                concept: "Saving".to_owned(),
                age_band: "7".to_owned(),
                pages: (1..=pages).map(page).collect(),
            },
            intro: Intro {
                text: "Hi friend!".to_owned(),
            },
            recap: Recap {
                summary: vec!["Piggy saved coins.".to_owned()],
                lesson: "Saving takes patience.".to_owned(),
            },
            knowledge_check: vec![question("A")],
            interaction_rules: InteractionRules::default(),
        }
    }

    #[test]
    fn test_valid_document_passes_validation() {
        assert_eq!(document(3).validate(), Ok(()));
    }

    #[test]
    fn test_document_without_pages_is_invalid() {
        assert_eq!(document(0).validate(), Err(DocumentError::NoPages));
    }

    #[test]
    fn test_pages_must_be_numbered_from_one_in_order() {
        // Arrange
        let mut doc = document(3);
        doc.book.pages[1].page_number = 5;

        // Act
        let result = doc.validate();

        // Assert
        assert_eq!(
            result,
            Err(DocumentError::PageOutOfOrder {
                position: 1,
                expected: 2,
                found: 5,
            })
        );
    }

    #[test]
    fn test_answer_must_name_a_choice() {
        // Arrange
        let mut doc = document(1);
        doc.knowledge_check = vec![question("C")];

        // Act
        let result = doc.validate();

        // Assert
        assert_eq!(
            result,
            Err(DocumentError::UnknownAnswer {
                index: 0,
                answer: "C".to_owned(),
            })
        );
    }

    #[test]
    fn test_empty_choices_are_invalid() {
        let mut doc = document(1);
        doc.knowledge_check[0].choices.clear();
        assert_eq!(doc.validate(), Err(DocumentError::NoChoices { index: 0 }));
    }

    #[test]
    fn test_duplicate_choice_labels_are_invalid() {
        let mut doc = document(1);
        doc.knowledge_check[0].choices[1].id = "A".to_owned();
        assert_eq!(
            doc.validate(),
            Err(DocumentError::DuplicateChoice {
                index: 0,
                choice_id: "A".to_owned(),
            })
        );
    }

    #[test]
    fn test_attach_image_to_page_two_leaves_everything_else_unchanged() {
        // Arrange
        let original = document(5);
        let mut doc = original.clone();

        // Act
        let outcome = doc
            .attach_image(2, ImageRef("data:image/png;base64,AAAA".to_owned()))
            .unwrap();

        // Assert
        assert_eq!(outcome, ImageAttach::Attached);
        let before = serde_json::to_value(&original).unwrap();
        let after = serde_json::to_value(&doc).unwrap();
        for index in [0_usize, 2, 3, 4] {
            assert_eq!(
                before["book"]["pages"][index],
                after["book"]["pages"][index]
            );
        }
        for field in ["piggy_intro", "piggy_recap", "knowledge_check", "piggy_interaction_rules"] {
            assert_eq!(before[field], after[field]);
        }
        assert_eq!(before["book"]["title"], after["book"]["title"]);
        assert_eq!(
            after["book"]["pages"][1]["image_url"],
            "data:image/png;base64,AAAA"
        );
    }

    #[test]
    fn test_attach_image_never_replaces_an_existing_image() {
        // Arrange
        let mut doc = document(2);
        doc.attach_image(1, ImageRef("first".to_owned())).unwrap();

        // Act
        let outcome = doc.attach_image(1, ImageRef("second".to_owned())).unwrap();

        // Assert
        assert_eq!(outcome, ImageAttach::AlreadyPresent);
        assert_eq!(
            doc.page(1).unwrap().image_url,
            Some(ImageRef("first".to_owned()))
        );
        assert_eq!(doc.pages_missing_images(), vec![2]);
    }

    #[test]
    fn test_attach_image_to_unknown_page_fails() {
        let mut doc = document(2);
        assert_eq!(
            doc.attach_image(9, ImageRef("x".to_owned())),
            Err(DocumentError::PageNotFound(9))
        );
    }

    #[test]
    fn test_document_parses_provider_json_shape() {
        // Arrange
        let json = serde_json::json!({
            "book": {
                "title": "Piggy Shares",
                "concept": "Sharing",
                "age_band": "6-8",
                "pages": [
                    { "page_number": 1, "image_prompt": "Piggy and a friend", "text": "Piggy has two apples." }
                ]
            },
            "piggy_intro": { "text": "Let's read!" },
            "piggy_recap": { "summary": ["Piggy shared."], "lesson": "Sharing feels good." },
            "knowledge_check": [],
            "piggy_interaction_rules": { "style": "warm", "allowed_topics": "money", "redirect_rule": "gently" }
        });

        // Act
        let doc: StoryDocument = serde_json::from_value(json).unwrap();

        // Assert
        assert_eq!(doc.book.pages.len(), 1);
        assert_eq!(doc.book.pages[0].image_url, None);
        assert_eq!(doc.interaction_rules.style, "warm");
        assert_eq!(doc.validate(), Ok(()));
    }
}
