use std::sync::Arc;
use tokio::sync::Mutex;

use crate::pipeline::Pipeline;

#[derive(Clone)]
pub struct AppState {
    pub pipeline: Arc<Pipeline>,
    /// Serializes pipeline runs within this process
    pub run_lock: Arc<Mutex<()>>,
}

impl AppState {
    pub fn new(pipeline: Pipeline) -> Self {
        Self {
            pipeline: Arc::new(pipeline),
            run_lock: Arc::new(Mutex::new(())),
        }
    }
}
