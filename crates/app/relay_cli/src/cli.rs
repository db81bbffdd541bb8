use clap::{Args, Parser, Subcommand};

#[derive(Parser, Debug)]
#[command(name = "relay", version, about = "Relay operator tools")]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Print the version
    Version,

    /// Issue and inspect control-plane tokens
    #[command(subcommand)]
    Token(TokenCommands),

    /// Inspect recorded webhooks
    #[command(subcommand)]
    Webhooks(WebhookCommands),
}

#[derive(Subcommand, Debug)]
pub enum TokenCommands {
    /// Issue a token for one or more installations
    Issue(IssueArgs),

    /// Verify a token and print its claims
    Verify {
        token: String,
    },
}

#[derive(Args, Debug)]
pub struct IssueArgs {
    /// Installation ID the token may act on (repeatable)
    #[arg(long = "iid", required = true)]
    pub iids: Vec<i64>,

    /// Display name of the user
    #[arg(long, default_value = "relay-dev")]
    pub name: String,

    #[arg(long, default_value = "")]
    pub avatar_url: String,

    /// GitHub user ID
    #[arg(long, default_value = "0")]
    pub user_id: String,

    /// Token lifetime in days
    #[arg(long, default_value_t = relay_core::auth::jwt::TOKEN_VALIDITY_DAYS)]
    pub days: i64,
}

#[derive(Subcommand, Debug)]
pub enum WebhookCommands {
    /// List webhooks recorded for an installation
    List {
        #[arg(long)]
        iid: i64,
    },

    /// Print one recorded webhook payload
    Show {
        #[arg(long)]
        iid: i64,

        #[arg(long)]
        event_id: String,
    },
}
