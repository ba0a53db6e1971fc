pub mod actions;
pub mod docs;
pub mod execute;
pub mod log;
pub mod tasks;
