pub mod process;
pub mod settings;
