pub mod compiler;
pub mod event_model;
pub mod instruction;
