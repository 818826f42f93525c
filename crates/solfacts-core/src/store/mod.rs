pub mod artifacts;
pub mod cache;
