use std::error::Error;

use dotenvy::dotenv;
use once_cell::sync::Lazy;
use teloxide::dispatching::UpdateFilterExt;
use teloxide::prelude::*;
use teloxide::utils::command::BotCommands;
use tracing::{error, info};

mod config;
mod handlers;
mod llm;
mod outfit;
mod state;
mod utils;

use config::{Config, CONFIG};
use handlers::commands;
use state::AppState;
use utils::logging::init_logging;

#[derive(BotCommands, Clone)]
#[command(rename_rule = "lowercase")]
enum Command {
    Start,
    Help,
    Design(String),
    Search(String),
    Budget(String),
    Reset,
}

type HandlerResult = Result<(), Box<dyn Error + Send + Sync>>;

#[tokio::main]
async fn main() -> HandlerResult {
    dotenv().ok();

    if let Err(err) = Config::load() {
        eprintln!("Configuration error: {err}");
        std::process::exit(1);
    }
    Lazy::force(&CONFIG);
    let _guards = init_logging();

    let bot = Bot::new(CONFIG.bot_token.clone());
    info!(
        model = %CONFIG.gemini_model,
        sites = %CONFIG.shop_sites.join(","),
        "Starting Paridhana outfit assistant"
    );

    let state = AppState::new(CONFIG.default_budget);

    let command_handler = dptree::entry()
        .filter_command::<Command>()
        .endpoint(handle_command);

    let message_handler = Update::filter_message()
        .branch(command_handler)
        .branch(dptree::filter(|msg: Message| msg.photo().is_some()).endpoint(handle_photo))
        .endpoint(ignore_message);

    Dispatcher::builder(bot, message_handler)
        .dependencies(dptree::deps![state])
        .enable_ctrlc_handler()
        .build()
        .dispatch()
        .await;

    Ok(())
}

async fn handle_command(
    bot: Bot,
    state: AppState,
    message: Message,
    command: Command,
) -> HandlerResult {
    match command {
        Command::Start => commands::start_handler(bot, message).await?,
        Command::Help => commands::help_handler(bot, message).await?,
        Command::Design(description) => {
            tokio::spawn(async move {
                if let Err(err) = commands::design_handler(bot, state, message, description).await
                {
                    error!("design handler failed: {err}");
                }
            });
        }
        Command::Search(filters) => {
            tokio::spawn(async move {
                if let Err(err) = commands::search_handler(bot, state, message, filters).await {
                    error!("search handler failed: {err}");
                }
            });
        }
        Command::Budget(amount) => commands::budget_handler(bot, state, message, amount).await?,
        Command::Reset => commands::reset_handler(bot, state, message).await?,
    }
    Ok(())
}

async fn handle_photo(bot: Bot, state: AppState, message: Message) -> HandlerResult {
    tokio::spawn(async move {
        if let Err(err) = commands::photo_handler(bot, state, message).await {
            error!("photo handler failed: {err}");
        }
    });
    Ok(())
}

async fn ignore_message(_message: Message) -> HandlerResult {
    Ok(())
}
