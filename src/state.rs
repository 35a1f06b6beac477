//! Shared handler state.

use crate::config::Config;
use crate::portal::dispatcher::DispatchService;
use chrono::{DateTime, Utc};
use std::sync::Arc;

#[derive(Clone)]
pub struct AppState {
    pub config: Arc<Config>,
    pub dispatcher: Arc<dyn DispatchService>,
    pub http: reqwest::Client,
    pub started_at: DateTime<Utc>,
}

impl AppState {
    pub fn new(config: Arc<Config>, dispatcher: Arc<dyn DispatchService>) -> Self {
        Self {
            config,
            dispatcher,
            http: reqwest::Client::new(),
            started_at: Utc::now(),
        }
    }
}
