pub mod csv;
pub mod selenese;
