//! Command-line interface for the integration hub.

use clap::{Parser, Subcommand};
use std::path::PathBuf;

/// Integration Hub - user accounts and third-party integration records over HTTP
#[derive(Parser)]
#[command(name = "integration-hub")]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    /// Read configuration from this file instead of the search path
    #[arg(long, global = true)]
    pub config: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Option<Commands>,
}

#[derive(Subcommand, Debug, PartialEq, Eq)]
pub enum Commands {
    /// Run the HTTP server (default)
    Serve {
        /// Override `server.host`
        #[arg(long)]
        host: Option<String>,

        /// Override `server.port`
        #[arg(long)]
        port: Option<u16>,
    },

    /// Write a default config.toml in the current directory
    #[command(alias = "--init")]
    Init,

    /// Create an account directly in the database
    CreateUser {
        username: String,

        email: String,

        #[arg(long)]
        password: String,

        /// Grant the admin capability
        #[arg(long)]
        admin: bool,

        /// Mark the account as staff
        #[arg(long)]
        staff: bool,
    },
}
