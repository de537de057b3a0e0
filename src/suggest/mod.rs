pub mod ai_model;
pub mod analyzer;
pub mod decode;
pub mod prompt;
pub mod suggestion_model;
