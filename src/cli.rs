use clap::{Parser, Subcommand};

/// edge-tokens: admin token API backed by Edge Config
#[derive(Parser)]
#[command(name = "edge-tokens", version, about)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Option<Commands>,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Start the admin API server
    Serve {
        /// Port to bind (defaults to PORT or 3000)
        #[arg(short, long)]
        port: Option<u16>,
    },

    /// Manage tokens directly against Edge Config
    Token {
        #[command(subcommand)]
        command: TokenCommands,
    },

    /// Manage blobs
    Blob {
        #[command(subcommand)]
        command: BlobCommands,
    },

    /// Run a single SQL statement against the configured database
    Sql {
        statement: String,
    },
}

#[derive(Subcommand)]
pub enum TokenCommands {
    /// Issue a new token (the secret is printed once)
    Issue {
        /// Use this secret instead of generating one
        #[arg(long)]
        token: Option<String>,
        /// Lifetime in seconds
        #[arg(long)]
        ttl_seconds: Option<f64>,
    },
    /// Show the stored record for a token
    Show {
        #[arg(long)]
        id: String,
    },
    /// Disable a token
    Disable {
        #[arg(long)]
        id: String,
    },
    /// Re-enable a token
    Enable {
        #[arg(long)]
        id: String,
    },
    /// Delete a token
    Delete {
        #[arg(long)]
        id: String,
    },
}

#[derive(Subcommand)]
pub enum BlobCommands {
    /// Upload a local file (public access)
    Upload {
        /// Destination pathname in the store
        #[arg(long)]
        pathname: String,
        /// Local file to read
        #[arg(long)]
        file: std::path::PathBuf,
    },
    /// Delete a blob by pathname or URL
    Delete {
        #[arg(long)]
        target: String,
    },
    /// List blobs
    List {
        #[arg(long)]
        prefix: Option<String>,
        #[arg(long)]
        cursor: Option<String>,
        #[arg(long)]
        limit: Option<u32>,
    },
}
