//! HTTP surface: health, dispatch triggers, Discord reporting.

pub mod discord;
pub mod error;
pub mod routes;
pub mod sms;
pub mod status;

pub use routes::create_router;
