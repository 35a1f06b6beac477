//! Attendance SMS dispatch service.
//!
//! A small HTTP service that drives a headless Chrome session against the
//! school messaging portal: it logs in, picks recipients out of the
//! address-book tree, composes a notice, clicks through the confirmation
//! dialogs, and verifies the result, then reports per-recipient outcomes to
//! the caller.

pub mod app;
pub mod cli;
pub mod config;
pub mod logging;
pub mod message;
pub mod portal;
pub mod roster;
pub mod state;
pub mod web;
