// src/cli/mod.rs
//! CLI definitions for packshift
//!
//! This module contains the command-line interface definitions using clap.
//! The command implementations are in the `commands` module.
//!
//! Pack commands:
//! - `list` - List saved packs, marking the active one
//! - `show` - Show a pack's description and components
//! - `save` - Snapshot the live components folder as a pack
//! - `load` - Switch the live components folder to a pack
//! - `remove` - Delete a pack
//!
//! Maintenance:
//! - `recover` - Finish or roll back an interrupted switch
//! - `deps` - Dependency closure of a catalog component
//! - `completions` - Shell completion scripts

use clap::{Parser, Subcommand};
use clap_complete::Shell;
use std::path::PathBuf;

#[derive(Parser)]
#[command(name = "packshift")]
#[command(author = "Packshift Project")]
#[command(version)]
#[command(about = "Named component packs with transactional switching", long_about = None)]
pub struct Cli {
    /// Config file (default: $PACKSHIFT_CONFIG, then the user config directory)
    #[arg(short, long, global = true)]
    pub config: Option<PathBuf>,

    /// Managed root holding the live folder and the packs (overrides the config)
    #[arg(short, long, global = true)]
    pub root: Option<PathBuf>,

    /// Log debug output
    #[arg(short, long, global = true)]
    pub verbose: bool,

    #[command(subcommand)]
    pub command: Option<Commands>,
}

#[derive(Subcommand)]
pub enum Commands {
    /// List saved packs
    List,

    /// Show a pack's description and components
    Show {
        /// Pack name
        name: String,
    },

    /// Save the live components folder as a pack
    Save {
        /// Pack name (an existing pack of this name is replaced)
        name: String,

        /// Free-text description
        #[arg(short, long, default_value = "")]
        description: String,
    },

    /// Switch the live components folder to a pack
    Load {
        /// Pack name
        name: String,

        /// Close a running host application without asking
        #[arg(short, long)]
        yes: bool,
    },

    /// Remove a pack and its folder
    Remove {
        /// Pack name
        name: String,
    },

    /// Roll back or finish a switch interrupted by a crash
    Recover,

    /// Print the dependency closure of a catalog component
    Deps {
        /// Component identifier
        component: String,
    },

    /// Generate shell completion scripts
    Completions {
        /// Shell type
        #[arg(value_enum)]
        shell: Shell,
    },
}
