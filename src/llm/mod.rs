pub mod completion;
pub mod embeddings;
pub mod history;
pub mod prompt;
