// Whisper Queue HTTP handlers
//
// The interface between HTTP clients and the job queue.

pub mod form;
pub mod routes;

// Re-export handlers for easier access
pub use self::routes::{
    add_job, api_status, cancel_job, configure, get_result, metrics_handler, remove_result,
};
