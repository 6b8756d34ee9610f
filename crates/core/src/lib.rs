pub mod error;
pub mod seasons;
pub mod types;
