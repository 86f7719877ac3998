//! API route modules.

pub mod attendance;
pub mod events;
pub mod presence;
pub mod report;

use crate::engine::EngineHandle;
use std::path::PathBuf;

/// Shared state handed to every route handler.
#[derive(Clone)]
pub struct ApiState {
    pub engine: EngineHandle,
    pub uploads_dir: PathBuf,
}
