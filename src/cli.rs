use clap::{Parser, Subcommand};

/// Deep research orchestration service
#[derive(Parser)]
#[command(name = "deep-research-service", version, about)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Option<Commands>,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Start the HTTP server
    Serve {
        /// Port to bind; overrides the PORT environment variable
        #[arg(short, long)]
        port: Option<u16>,
    },
}
