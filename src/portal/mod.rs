//! Browser-driven automation of the school messaging portal.
//!
//! The workflow is login → address-book navigation → composition →
//! submission → verification, orchestrated per batch by [`dispatcher`].

pub mod composer;
pub mod dispatcher;
pub mod errors;
pub mod login;
pub mod navigator;
pub mod session;
pub mod submit;
pub mod verify;
pub mod wait;
