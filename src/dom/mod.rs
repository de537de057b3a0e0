pub mod document;
pub mod fields;
pub mod tokens;
pub mod truncate;
