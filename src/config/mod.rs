mod loader;
pub mod schema;

pub use schema::{
    Config, EngineConfig, HttpConfig, RateLimitConfig, SearchConfig, SecurityConfig, ShellConfig,
};
