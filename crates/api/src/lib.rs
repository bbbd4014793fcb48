pub mod error;
pub mod middleware;
pub mod routes;
pub mod server;

pub use error::{ApiError, ApiResult};
pub use server::ApiServer;

// Re-export common types
pub use vistula_bot_common;
pub use vistula_bot_core;
