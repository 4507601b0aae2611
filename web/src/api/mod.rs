//! API endpoint handlers.

pub mod health;
pub mod leads;
pub mod webhooks;
