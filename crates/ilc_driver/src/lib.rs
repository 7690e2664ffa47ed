mod api;
mod output;
mod pipeline;

pub use api::Compiler;
pub use output::write_units;
pub use pipeline::{check_file, compile_file};
