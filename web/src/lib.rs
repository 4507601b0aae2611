//! # Leadmarket Web
//!
//! HTTP surface for the leadmarket allocation engine:
//!
//! - `POST /api/leads/{id}/purchase`: optimistic client-initiated purchase
//! - `GET /api/leads/{id}`: read-only allocation snapshot
//! - `POST /webhooks/payments`: signed payment-gateway confirmations
//! - `GET /health`, `GET /ready`: probes
//!
//! The handlers own nothing but translation: request parsing, invoking the
//! core engine, and mapping outcomes and errors onto status codes the
//! clients and the gateway expect.

pub mod api;
pub mod config;
pub mod error;
pub mod routes;
pub mod state;

pub use config::Config;
pub use error::AppError;
pub use routes::build_router;
pub use state::AppState;
