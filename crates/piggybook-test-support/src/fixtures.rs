//! Story and audio fixtures.

use piggybook_core::story::{
    AudioBytes, Book, Choice, InteractionRules, Intro, KnowledgeCheckItem, Page, Recap,
    StoryDocument,
};

/// A valid story about saving with `pages` pages and two scenario questions.
#[must_use]
pub fn sample_story(pages: u32) -> StoryDocument {
    StoryDocument {
        book: Book {
            title: "Piggy and the Shiny Jar".to_owned(),
            concept: "The Power of Saving".to_owned(),
            age_band: "7".to_owned(),
            pages: (1..=pages)
                .map(|n| Page {
                    page_number: n,
                    image_prompt: format!("Piggy drops coin number {n} into a glass jar"),
                    text: format!("On day {n} Piggy put one shiny coin in the jar."),
                    image_url: None,
                })
                .collect(),
        },
        intro: Intro {
            text: "Hi friend! Let's learn about saving together.".to_owned(),
        },
        recap: Recap {
            summary: vec![
                "Piggy saved a coin every day.".to_owned(),
                "The jar filled up slowly.".to_owned(),
            ],
            lesson: "Small savings add up to big goals.".to_owned(),
        },
        knowledge_check: vec![
            KnowledgeCheckItem {
                question: "You get $5 allowance and want a $4 toy, but your friend's \
                           birthday is tomorrow. What do you do?"
                    .to_owned(),
                choices: vec![
                    Choice {
                        id: "A".to_owned(),
                        text: "Buy the toy right away".to_owned(),
                    },
                    Choice {
                        id: "B".to_owned(),
                        text: "Save some for a gift".to_owned(),
                    },
                ],
                correct_answer: "B".to_owned(),
                explanation: "Planning ahead lets you do both over time.".to_owned(),
            },
            KnowledgeCheckItem {
                question: "You find $1 on the way home. Where could it go?".to_owned(),
                choices: vec![
                    Choice {
                        id: "A".to_owned(),
                        text: "Into your savings jar".to_owned(),
                    },
                    Choice {
                        id: "B".to_owned(),
                        text: "Lose it in your pocket".to_owned(),
                    },
                ],
                correct_answer: "A".to_owned(),
                explanation: "Every coin you save counts.".to_owned(),
            },
        ],
        interaction_rules: InteractionRules {
            style: "warm and encouraging".to_owned(),
            allowed_topics: "saving, spending, sharing".to_owned(),
            redirect_rule: "Gently steer back to money topics.".to_owned(),
        },
    }
}

/// Silent 16-bit little-endian mono PCM lasting `millis` at `sample_rate`.
#[must_use]
pub fn pcm_silence(millis: u64, sample_rate: u32) -> AudioBytes {
    let frames = u64::from(sample_rate) * millis / 1000;
    let len = usize::try_from(frames * 2).unwrap_or(usize::MAX);
    AudioBytes(vec![0; len])
}
