pub mod api;
pub mod classifier;
pub mod config;
pub mod error;

use std::sync::Arc;
use classifier::Classifier;
use config::Config;

/// Application state that will be shared across handlers
#[derive(Clone)]
pub struct AppState {
    pub config: Arc<Config>,
    pub classifier: Arc<Classifier>,
}

impl AppState {
    pub fn new(config: Config) -> Self {
        let classifier = Classifier::from_config(&config);
        AppState {
            config: Arc::new(config),
            classifier: Arc::new(classifier),
        }
    }
}
