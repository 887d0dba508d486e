//! CLI command implementations

pub mod info;
pub mod logs;
pub mod run;

pub use info::print_info;
pub use logs::handle_logs;
pub use run::{handle_run, RunOptions};
