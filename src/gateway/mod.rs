//! HTTP gateway: login endpoints, quota-gated search, quota status.

mod handlers;
mod server;
mod state;
mod upstream;

pub use handlers::{
    identify, with_rate_limit_headers, Caller, X_RATELIMIT_LIMIT, X_RATELIMIT_REMAINING,
    X_RATELIMIT_RESET,
};
pub use server::{router, GatewayServer};
pub use state::GatewayState;
pub use upstream::{HttpSearchProvider, SearchProvider, SearchQuery};
