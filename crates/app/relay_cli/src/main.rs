// Import and re-export the `error` module
pub use self::error::{Error, Result};
mod error;

use chrono::Duration;
use clap::Parser;
use cli::{Cli, Commands, IssueArgs, TokenCommands, WebhookCommands};
use relay_core::auth::jwt::{issue_token_with_validity, resolve_jwt_secret, verify_token};
use relay_core::models::auth::UserIdentity;
use relay_core::storage::{StorageConfig, open_store};

mod cli;
mod logging;

fn main() -> Result<()> {
    let logger = logging::init()?;
    let args = Cli::parse();

    if let Err(e) = run(args) {
        log::error!("{}", e);
        logger.flush();
        std::process::exit(1);
    }
    Ok(())
}

fn run(args: Cli) -> Result<()> {
    match args.command {
        Commands::Version => {
            println!("{} {}", env!("CARGO_PKG_NAME"), env!("CARGO_PKG_VERSION"));
        }
        Commands::Token(TokenCommands::Issue(issue)) => issue_token(issue)?,
        Commands::Token(TokenCommands::Verify { token }) => {
            let claims = verify_token(&token, resolve_jwt_secret().as_bytes())?;
            println!("{}", serde_json::to_string_pretty(&claims)?);
        }
        Commands::Webhooks(command) => webhooks(command)?,
    }

    Ok(())
}

fn issue_token(args: IssueArgs) -> Result<()> {
    let user = UserIdentity {
        name: args.name,
        avatar_url: args.avatar_url,
        id: args.user_id,
    };
    let token = issue_token_with_validity(
        &user,
        &args.iids,
        resolve_jwt_secret().as_bytes(),
        Duration::days(args.days),
    )?;
    log::debug!("issued token for installations {:?}", args.iids);
    println!("{token}");
    Ok(())
}

fn webhooks(command: WebhookCommands) -> Result<()> {
    let runtime = tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()?;

    runtime.block_on(async {
        let store = open_store(&StorageConfig::from_env()?).await?;
        match command {
            WebhookCommands::List { iid } => {
                let webhooks = store.list_recorded_webhooks(iid).await?;
                if webhooks.is_empty() {
                    log::info!("No webhooks recorded for installation {iid}");
                }
                for webhook in webhooks {
                    println!(
                        "{}\t{}\t{}",
                        webhook.created_at.to_rfc3339(),
                        webhook.event_id,
                        webhook.event
                    );
                }
            }
            WebhookCommands::Show { iid, event_id } => {
                let webhook = store
                    .get_recorded_webhook(iid, &event_id)
                    .await?
                    .ok_or_else(|| {
                        Error::Custom(format!("No webhook {event_id} for installation {iid}"))
                    })?;
                println!("{}", serde_json::to_string_pretty(&webhook.json)?);
            }
        }
        Ok(())
    })
}
