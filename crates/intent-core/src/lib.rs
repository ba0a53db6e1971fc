pub mod collaborator;
pub mod config;
pub mod dispatch;
pub mod doc_queue;
pub mod error;
pub mod execution_log;
pub mod handlers;
pub mod hub;
pub mod intent_lock;
pub mod io;
pub mod paths;
pub mod registry;
pub mod schema;
pub mod script;
pub mod task_queue;

pub use error::{HubError, Result};
pub use hub::Hub;
