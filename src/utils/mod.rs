pub mod fs;
pub mod process;

pub use process::{
    find_executable, run_checked, CommandOutput, CommandRunner, CommandSpec, RecordingRunner,
    SystemRunner,
};
