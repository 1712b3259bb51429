pub mod finding;
pub mod market;
pub mod timestamp;
