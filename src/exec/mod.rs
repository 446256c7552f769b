pub mod shell;

pub use shell::{ExecResult, execute_shell};
