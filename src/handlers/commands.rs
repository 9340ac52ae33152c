use anyhow::Result;
use teloxide::prelude::*;
use teloxide::types::{ChatAction, FileId, InputFile, ParseMode, ReplyParameters};
use tracing::{error, info, warn};

use crate::config::CONFIG;
use crate::handlers::access::is_rate_limited;
use crate::handlers::responses::{
    design_image_notice, design_reply, design_text_notice, parse_budget, search_notice,
    search_reply, send_response, tagging_notice,
};
use crate::llm::media::download_media;
use crate::outfit::illustration::image_file_name;
use crate::outfit::search::SearchOutcome;
use crate::outfit::types::{SearchRequest, TagKey};
use crate::outfit::{extract_outfit_tags, generate_design_text, render_design_image, search_products};
use crate::state::AppState;
use crate::utils::telegram::start_chat_action_heartbeat;
use crate::utils::timing::{complete_command_timer, start_command_timer};

const DESIGN_IMAGE_CAPTION: &str = "Design image";

fn sender_id(message: &Message) -> i64 {
    message
        .from
        .as_ref()
        .and_then(|user| i64::try_from(user.id.0).ok())
        .unwrap_or_default()
}

async fn reply_text(bot: &Bot, message: &Message, text: impl Into<String>) -> Result<()> {
    bot.send_message(message.chat.id, text.into())
        .reply_parameters(ReplyParameters::new(message.id))
        .await?;
    Ok(())
}

/// Replies and returns true when the sender is inside the rate-limit window.
async fn reject_if_rate_limited(bot: &Bot, message: &Message) -> Result<bool> {
    if !is_rate_limited(sender_id(message)) {
        return Ok(false);
    }
    reply_text(bot, message, "Rate limit exceeded. Please try again later.").await?;
    Ok(true)
}

async fn get_file_url(bot: &Bot, file_id: &FileId) -> Result<String> {
    let file = bot.get_file(file_id.clone()).await?;
    Ok(format!(
        "https://api.telegram.org/file/bot{}/{}",
        CONFIG.bot_token, file.path
    ))
}

pub async fn design_handler(
    bot: Bot,
    state: AppState,
    message: Message,
    description: String,
) -> Result<()> {
    let description = description.trim().to_string();
    if description.is_empty() {
        reply_text(
            &bot,
            &message,
            "Please enter a description first.\nUsage: /design elegant navy blue saree with silver border",
        )
        .await?;
        return Ok(());
    }
    if reject_if_rate_limited(&bot, &message).await? {
        return Ok(());
    }

    let chat_id = message.chat.id.0;
    let mut timer = start_command_timer("design", &message);
    state.update_session(chat_id, |session| session.prompt = description.clone());

    let processing_message = bot
        .send_message(message.chat.id, "Generating design and image...")
        .reply_parameters(ReplyParameters::new(message.id))
        .await?;
    let _chat_action =
        start_chat_action_heartbeat(bot.clone(), message.chat.id, ChatAction::Typing);

    let (text_result, image_result) = tokio::join!(
        generate_design_text(&description),
        render_design_image(&description)
    );

    let mut notices = Vec::new();
    let design_text = text_result.unwrap_or_else(|err| {
        notices.push(design_text_notice(&err));
        String::new()
    });
    let image = match image_result {
        Ok(bytes) => Some(bytes),
        Err(err) => {
            notices.push(design_image_notice(&err));
            None
        }
    };
    state.update_session(chat_id, |session| {
        session.set_design(design_text.clone(), image.clone())
    });

    let reply = design_reply(&design_text, &notices);
    send_response(&bot, message.chat.id, processing_message.id, &reply, None).await?;

    if let Some(image) = image {
        let file_name = image_file_name(&image);
        if let Err(err) = bot
            .send_photo(message.chat.id, InputFile::memory(image).file_name(file_name))
            .caption(DESIGN_IMAGE_CAPTION)
            .reply_parameters(ReplyParameters::new(message.id))
            .await
        {
            error!("Failed to send design image: {err}");
            notices.push("Could not deliver the design image.".to_string());
        }
    }

    let status = if notices.is_empty() { "success" } else { "degraded" };
    complete_command_timer(
        &mut timer,
        status,
        (!notices.is_empty()).then(|| notices.join(" | ")),
    );
    Ok(())
}

pub async fn search_handler(
    bot: Bot,
    state: AppState,
    message: Message,
    filters: String,
) -> Result<()> {
    let chat_id = message.chat.id.0;
    let filters = filters.trim().to_string();
    let session = state.update_session(chat_id, |session| {
        if !filters.is_empty() {
            session.search_text = filters.clone();
        }
        session.clone()
    });

    if session.prompt.trim().is_empty() && session.design_image.is_none() {
        reply_text(
            &bot,
            &message,
            "Please generate a design with /design or send an outfit photo first!",
        )
        .await?;
        return Ok(());
    }
    if reject_if_rate_limited(&bot, &message).await? {
        return Ok(());
    }

    let mut timer = start_command_timer("search", &message);
    let processing_message = bot
        .send_message(message.chat.id, "Searching for products...")
        .reply_parameters(ReplyParameters::new(message.id))
        .await?;
    let _chat_action =
        start_chat_action_heartbeat(bot.clone(), message.chat.id, ChatAction::Typing);

    let mut notices = Vec::new();
    let image_tags = match session.design_image.as_deref() {
        Some(image) => match extract_outfit_tags(image).await.inspect(|tags| {
            info!(
                origin = ?session.image_origin,
                tags = tags.len(),
                garment = tags.get(TagKey::GarmentType).unwrap_or("unknown"),
                "Outfit image tagged"
            );
        }) {
            Ok(tags) => Some(tags),
            Err(err) => {
                notices.push(tagging_notice(&err));
                None
            }
        },
        None => None,
    };

    let request = SearchRequest {
        outfit_description: session.prompt.clone(),
        extra_filters: session.search_text.clone(),
        budget: session.budget,
        candidate_sites: CONFIG.shop_sites.clone(),
        image_tags,
    };
    let outcome = search_products(&request).await;
    if let Some(notice) = search_notice(&outcome) {
        notices.push(notice);
    }

    if let SearchOutcome::Found { rejected, .. } = &outcome {
        info!(
            kept = outcome.listings().len(),
            rejected = rejected.len(),
            "Product candidates screened"
        );
    }
    let products = outcome.into_listings();
    state.update_session(chat_id, |session| session.products = products.clone());

    let reply = search_reply(&products, &notices, request.budget);
    send_response(
        &bot,
        message.chat.id,
        processing_message.id,
        &reply,
        Some(ParseMode::Html),
    )
    .await?;

    let status = if notices.is_empty() { "success" } else { "degraded" };
    complete_command_timer(
        &mut timer,
        status,
        Some(format!("products={}", products.len())),
    );
    Ok(())
}

pub async fn budget_handler(
    bot: Bot,
    state: AppState,
    message: Message,
    amount: String,
) -> Result<()> {
    let chat_id = message.chat.id.0;
    if amount.trim().is_empty() {
        let budget = state.session(chat_id).budget;
        reply_text(
            &bot,
            &message,
            format!("Current budget: ₹{budget}\nUsage: /budget 2500"),
        )
        .await?;
        return Ok(());
    }

    match parse_budget(&amount, CONFIG.min_budget) {
        Ok(budget) => {
            state.update_session(chat_id, |session| session.budget = budget);
            info!(chat_id, budget, "Budget updated");
            reply_text(&bot, &message, format!("Budget set to ₹{budget}.")).await?;
        }
        Err(reason) => reply_text(&bot, &message, reason).await?,
    }
    Ok(())
}

pub async fn reset_handler(bot: Bot, state: AppState, message: Message) -> Result<()> {
    state.reset_session(message.chat.id.0);
    reply_text(&bot, &message, "Session cleared. Start again with /design.").await
}

/// Stores the largest size of a sent photo as the outfit image for /search.
pub async fn photo_handler(bot: Bot, state: AppState, message: Message) -> Result<()> {
    let Some(photo) = message.photo().and_then(|sizes| sizes.last()) else {
        return Ok(());
    };

    let url = get_file_url(&bot, &photo.file.id).await?;
    let Some(bytes) = download_media(&url).await else {
        warn!("Outfit photo download failed for chat {}", message.chat.id.0);
        reply_text(&bot, &message, "Couldn't download that photo. Please try again.").await?;
        return Ok(());
    };

    let size = bytes.len();
    state.update_session(message.chat.id.0, |session| session.set_uploaded_image(bytes));
    info!(chat_id = message.chat.id.0, size, "Outfit photo stored");
    reply_text(
        &bot,
        &message,
        "Got your outfit photo. Use /search to find similar products.",
    )
    .await
}

pub async fn help_handler(bot: Bot, message: Message) -> Result<()> {
    let help_text = "
<b>Paridhana Outfit Assistant</b>

/design - Generate an outfit design and illustration
Usage: <code>/design elegant navy blue saree with silver border</code>

/search - Find similar products within your budget
Usage: <code>/search</code> or <code>/search [color, fabric or style filters]</code>

/budget - Show or set your budget in rupees (minimum ₹100)
Usage: <code>/budget 2500</code>

Send a photo of an outfit to search for products like it.

/reset - Clear your current design, photo, filters and budget

/help - Show this help message
";

    bot.send_message(message.chat.id, help_text)
        .reply_parameters(ReplyParameters::new(message.id))
        .parse_mode(ParseMode::Html)
        .await?;
    Ok(())
}

pub async fn start_handler(bot: Bot, message: Message) -> Result<()> {
    reply_text(
        &bot,
        &message,
        "Namaste! I am Paridhana, your outfit design assistant. Describe a look with /design, then /search for products. Use /help to see all commands.",
    )
    .await
}
