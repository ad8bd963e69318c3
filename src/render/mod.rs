//! Turning a validated tree into shell scripts.

pub mod shell;

pub use shell::{RenderedFile, ShellType, render_files, render_installer, script_file_name};
