pub mod catalog;
pub mod cli;
pub mod gemini;
pub mod media;
pub mod progress;
pub mod shopify;
pub mod sources;
pub mod tracing;

pub mod util {
    pub mod env;
}
