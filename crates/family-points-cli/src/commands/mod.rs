pub mod common;
pub mod completions;
pub mod config;
pub mod remote;
pub mod reset;
pub mod sync;
pub mod watch;
