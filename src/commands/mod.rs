// src/commands/mod.rs
//! Command handlers for the packshift CLI

mod pack;
pub mod progress;
mod system;

pub use pack::{cmd_list, cmd_load, cmd_remove, cmd_save, cmd_show};
pub use system::{cmd_completions, cmd_deps, cmd_recover};
