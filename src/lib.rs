pub mod checkpoint;
pub mod cli;
pub mod config;
pub mod copier;
pub mod embedded_log;
pub mod job;
pub mod names;
pub mod pipeline;
pub mod progress;
pub mod reconcile;
pub mod supervisor;
pub mod util;
pub mod validate;
