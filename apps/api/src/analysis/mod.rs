pub mod analyzer;
pub mod handlers;
pub mod models;
pub mod normalizer;
pub mod prompts;
pub mod report;
