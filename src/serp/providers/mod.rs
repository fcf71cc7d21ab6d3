pub mod dataforseo;
pub mod serpapi;
