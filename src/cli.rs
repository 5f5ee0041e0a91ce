use clap::{Parser, Subcommand};

/// HubSpot integration service: OAuth flow and contact loading
#[derive(Parser)]
#[command(name = "integrations-server", version, about)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Option<Commands>,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Start the HTTP server
    Serve {
        /// Port to bind (defaults to PORT or 8000)
        #[arg(short, long)]
        port: Option<u16>,
        /// Keep OAuth state in process memory instead of Redis
        #[arg(long)]
        memory_store: bool,
    },

    /// Start an OAuth flow and print the consent URL
    Authorize {
        #[arg(long)]
        user_id: String,
        #[arg(long)]
        org_id: String,
    },

    /// Fetch contacts with a credential and print them as integration items
    Items {
        /// Credential JSON, e.g. '{"access_token":"..."}'
        #[arg(long, env = "HUBSPOT_CREDENTIALS")]
        credentials: String,
    },
}
