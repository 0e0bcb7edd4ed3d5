//! Configuration, paths, and logging bootstrap for the HW Legacy Group portal.

mod config;
mod error;
mod http;
mod logging;
mod paths;

pub use config::{
    Config, DEFAULT_LOG_LEVEL, DEFAULT_ROLE_TABLE, DEFAULT_SUPABASE_ANON_KEY,
    DEFAULT_SUPABASE_URL,
};
pub use error::{CoreError, CoreResult};
pub use http::summarize_response_body;
pub use logging::{init_logging, parse_level};
pub use paths::Paths;
