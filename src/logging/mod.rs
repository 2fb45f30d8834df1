//! Logging: a persistent log file plus an optional stderr stream.
//!
//! Every invocation appends to `rhc.log` under the directory chosen by
//! [`log_dir`]. The stderr stream only exists with `--verbose`, so normal
//! console output stays limited to the report lines.

mod subscriber;
mod utils;

pub use subscriber::{ENV_FILTER_VAR, LogSettings, init_subscriber};
pub use utils::{LOG_FILE_NAME, SYSTEM_LOG_DIR, log_dir};
