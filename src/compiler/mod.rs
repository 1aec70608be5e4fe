pub mod native;
pub mod python;
pub mod toolchain;

pub use native::NativeCompiler;
pub use python::{discover_python, locate_package, InterpreterConfig};
pub use toolchain::Toolchain;
