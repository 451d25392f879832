//! Provider adapters.
//!
//! Implements the story, image and speech ports from `piggybook-core` over
//! the Gemini `generateContent` REST API.

pub mod client;
pub mod config;
pub mod image;
pub mod speech;
pub mod story;
pub mod wire;

pub use client::GeminiClient;
pub use config::GeminiConfig;
pub use image::GeminiImageGenerator;
pub use speech::GeminiSpeechSynthesizer;
pub use story::GeminiStoryGenerator;
