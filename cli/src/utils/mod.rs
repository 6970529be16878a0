//! Utilities shared by the commands:
//! - `io`: logging and reading answers from stdin
//! - `process`: running external executables (`git`, `docker`, `gcloud`)

pub mod io;
pub mod process;

pub use io::{init_env_logger, read_from_stdin, LOG_PREFIX_INFO};
