pub mod combiner;
pub mod generator;
