pub mod handlers;
pub mod middleware;
pub mod routes;
pub mod service;

pub use routes::create_redirect_router;
pub use service::{ClickOutcome, FallbackReason, RedirectOutcome, RedirectService};
