//! CLI module - Command-line interface for acctmgr
//!
//! This module provides a structured CLI using clap for argument parsing.

mod commands;

use clap::{Parser, Subcommand};
use std::path::PathBuf;

use crate::config::Config;

/// acctmgr - BOINC account manager
/// Tells volunteer computing clients which projects to attach to
#[derive(Parser)]
#[command(name = "acctmgr")]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    /// Config file to use instead of the default search path
    #[arg(long, short, global = true, env = "ACCTMGR_CONFIG")]
    pub config: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Option<Commands>,
}

impl Cli {
    /// Loads the configuration this invocation should use.
    pub fn load_config(&self) -> anyhow::Result<Config> {
        match &self.config {
            Some(path) => {
                let mut config = Config::load_from_path(path)?;
                config.apply_env_overrides();
                Ok(config)
            }
            None => Config::load(),
        }
    }
}

#[derive(Subcommand)]
pub enum Commands {
    /// Run the account manager server (default)
    #[command(alias = "-d", alias = "--daemon", alias = "daemon")]
    Serve,

    /// Create default config file
    #[command(alias = "--init")]
    Init,

    /// Create a user account
    CreateUser {
        username: String,
        email: String,
        /// Password; prompted for when not given
        #[arg(long, env = "ACCTMGR_NEW_USER_PASSWORD", hide_env_values = true)]
        password: Option<String>,
        /// Grant the admin role
        #[arg(long)]
        admin: bool,
    },

    /// Enable or disable a user account
    SetActive {
        username: String,
        #[arg(action = clap::ArgAction::Set)]
        active: bool,
    },

    /// Print the hash a BOINC client sends for these credentials
    ProtocolHash { username: String, password: String },

    /// Manage the project catalogue
    Project {
        #[command(subcommand)]
        command: ProjectCommands,
    },

    /// Store a user's account key for a project (encrypted at rest)
    SetKey {
        username: String,
        project_id: i32,
        account_key: String,
    },

    /// List a user's computers
    Computers { username: String },

    /// Attach a computer to a project
    Attach {
        computer_id: i32,
        project_id: i32,
        /// Resource share sent to the client
        #[arg(long, default_value = "100")]
        resource_share: rust_decimal::Decimal,
        /// Let running tasks finish, then detach
        #[arg(long)]
        detach_when_done: bool,
    },

    /// Ask a computer to finish its work for a project, then detach
    Detach { computer_id: i32, project_id: i32 },
}

#[derive(Subcommand)]
pub enum ProjectCommands {
    /// Add a project
    Add {
        name: String,
        url: String,
        /// Project URL signed with the manager's key
        signed_url: String,
        #[arg(long, default_value = "")]
        description: String,
    },
    /// List projects
    #[command(alias = "ls")]
    List,
    /// Enable a project
    Enable { id: i32 },
    /// Disable a project; attached computers detach on their next contact
    Disable { id: i32 },
}

pub use commands::*;
