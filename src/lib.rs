pub mod core;
pub mod lang;
pub mod llm;
pub mod nlp;
pub mod pipeline;
pub mod scraping;
pub mod serp;

// --- Primary core exports ---
pub use self::core::config;
pub use self::core::types;
pub use self::core::types::*;
pub use self::core::AppState;
