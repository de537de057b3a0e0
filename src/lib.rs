pub mod cli;
pub mod dom;
pub mod error;
pub mod recording;
pub mod script;
pub mod server;
pub mod suggest;
pub mod testcase;
pub mod trace;

pub use error::CompanionError;
