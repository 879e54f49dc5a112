pub mod gemini;

pub use gemini::{GeminiChat, GeminiConfig, GeminiEmbeddings};
