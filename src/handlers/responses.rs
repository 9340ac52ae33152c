use std::time::Duration;

use anyhow::Result;
use teloxide::prelude::*;
use teloxide::types::{MessageId, ParseMode};
use teloxide::utils::html;
use tracing::warn;

use crate::config::CONFIG;
use crate::outfit::error::{ExtractionFailure, OutfitError};
use crate::outfit::search::SearchOutcome;
use crate::outfit::types::ProductListing;

const TRUNCATION_NOTE: &str = "...\n\n(Response was truncated due to length)";

async fn edit_text_with_retry(
    bot: &Bot,
    chat_id: ChatId,
    message_id: MessageId,
    text: &str,
    parse_mode: Option<ParseMode>,
) -> Result<()> {
    let mut delay = Duration::from_secs_f32(1.5);
    for attempt in 0..3 {
        let request = bot.edit_message_text(chat_id, message_id, text.to_string());
        let request = if let Some(mode) = parse_mode {
            request.parse_mode(mode)
        } else {
            request
        };

        match request.await {
            Ok(_) => return Ok(()),
            Err(err) => {
                if attempt == 2 {
                    return Err(err.into());
                }
                warn!("edit_message_text failed: {err}");
                tokio::time::sleep(delay).await;
                delay *= 2;
            }
        }
    }

    Ok(())
}

/// Cuts `text` to at most `limit` characters, marking the cut.
pub fn truncate_message(text: &str, limit: usize) -> String {
    if text.chars().count() <= limit {
        return text.to_string();
    }
    let keep = limit.saturating_sub(TRUNCATION_NOTE.chars().count());
    let head: String = text.chars().take(keep).collect();
    format!("{head}{TRUNCATION_NOTE}")
}

/// Keeps whole lines only, so markup that opens and closes on one line stays
/// balanced. `None` when not even the first line fits.
pub fn truncate_at_line(text: &str, limit: usize) -> Option<String> {
    if text.chars().count() <= limit {
        return Some(text.to_string());
    }
    let budget = limit.saturating_sub(TRUNCATION_NOTE.chars().count());
    let mut kept = String::new();
    let mut kept_chars = 0usize;
    for line in text.lines() {
        let line_chars = line.chars().count() + 1;
        if kept_chars + line_chars > budget {
            break;
        }
        kept.push_str(line);
        kept.push('\n');
        kept_chars += line_chars;
    }
    let kept = kept.trim_end();
    if kept.is_empty() {
        return None;
    }
    Some(format!("{kept}{TRUNCATION_NOTE}"))
}

/// Replaces the "working on it" message with the final reply. Formatted
/// replies that Telegram rejects are retried as plain text.
pub async fn send_response(
    bot: &Bot,
    chat_id: ChatId,
    message_id: MessageId,
    response: &str,
    parse_mode: Option<ParseMode>,
) -> Result<()> {
    if response.chars().count() > CONFIG.telegram_max_length {
        let limit = CONFIG.telegram_max_length;
        if parse_mode.is_some() {
            if let Some(truncated) = truncate_at_line(response, limit) {
                edit_text_with_retry(bot, chat_id, message_id, &truncated, parse_mode).await?;
                return Ok(());
            }
        }
        let truncated = truncate_message(response, limit);
        edit_text_with_retry(bot, chat_id, message_id, &truncated, None).await?;
        return Ok(());
    }

    if parse_mode.is_none() {
        return edit_text_with_retry(bot, chat_id, message_id, response, None).await;
    }

    if let Err(err) = edit_text_with_retry(bot, chat_id, message_id, response, parse_mode).await
    {
        warn!("Failed to send formatted response: {err}");
        edit_text_with_retry(bot, chat_id, message_id, response, None).await?;
    }

    Ok(())
}

pub fn design_text_notice(err: &OutfitError) -> String {
    format!("Design generation error: {err}")
}

pub fn design_image_notice(err: &OutfitError) -> String {
    match err {
        OutfitError::Timeout => "Image generation timed out. Please try again.".to_string(),
        OutfitError::HttpStatus(status) => format!("Image generation failed: HTTP {status}"),
        OutfitError::InvalidImage { .. } => {
            "Image generation service returned invalid data. Please try again.".to_string()
        }
        other => format!("Image generation error: {other}"),
    }
}

pub fn tagging_notice(err: &OutfitError) -> String {
    format!("Image tagging error: {err}")
}

/// The user-facing note for a search outcome, if it needs one.
pub fn search_notice(outcome: &SearchOutcome) -> Option<String> {
    match outcome {
        SearchOutcome::NothingToSearch => {
            Some("Please generate a design first before searching for products.".to_string())
        }
        SearchOutcome::NoProducts => Some("No products found. Try a different search.".to_string()),
        SearchOutcome::Fallback {
            cause: cause @ OutfitError::Extraction(ExtractionFailure::ElementNotAnObject { .. }),
            ..
        } => Some(format!("Search error: {cause}")),
        SearchOutcome::Fallback {
            cause: OutfitError::Extraction(failure),
            ..
        } => Some(format!(
            "Failed to parse product data: {failure}\nThe API response was not valid JSON. Showing dummy products instead."
        )),
        SearchOutcome::Fallback { cause, .. } => Some(format!("Search error: {cause}")),
        SearchOutcome::Found { .. } => None,
    }
}

pub fn format_price(price: f64) -> String {
    if price.fract() == 0.0 {
        format!("{price:.0}")
    } else {
        format!("{price:.2}")
    }
}

pub fn design_reply(design_text: &str, notices: &[String]) -> String {
    let mut sections = Vec::new();
    if !design_text.trim().is_empty() {
        sections.push(design_text.trim().to_string());
    }
    sections.extend(notices.iter().map(|notice| format!("⚠️ {notice}")));
    if sections.is_empty() {
        return "No design was generated. Please try again.".to_string();
    }
    sections.join("\n\n")
}

/// HTML reply listing products, with any notices escaped above them.
pub fn search_reply(products: &[ProductListing], notices: &[String], budget: u32) -> String {
    let mut reply = String::new();
    for notice in notices {
        reply.push_str(&format!("⚠️ {}\n", html::escape(notice)));
    }

    if products.is_empty() {
        if notices.is_empty() {
            reply.push_str(&format!(
                "No products fit within your budget of ₹{budget}. Try raising it with /budget."
            ));
        }
        return reply.trim_end().to_string();
    }

    if !reply.is_empty() {
        reply.push('\n');
    }
    reply.push_str("<b>Similar outfits found</b>\n");
    for (index, product) in products.iter().enumerate() {
        let title = if product.title.is_empty() {
            "Untitled product"
        } else {
            product.title.as_str()
        };
        let site = if product.site.is_empty() {
            "Unknown"
        } else {
            product.site.as_str()
        };
        reply.push_str(&format!(
            "{}. <b>{}</b>\n₹{} · {} · <a href=\"{}\">View</a>\n",
            index + 1,
            html::escape(title),
            format_price(product.price),
            html::escape(site),
            html::escape(&product.url)
        ));
    }
    reply.trim_end().to_string()
}

/// Reads a budget in rupees, tolerating a currency sign and digit grouping.
pub fn parse_budget(text: &str, min_budget: u32) -> std::result::Result<u32, String> {
    let cleaned: String = text
        .trim()
        .trim_start_matches('₹')
        .chars()
        .filter(|ch| *ch != ',' && *ch != '_')
        .collect();
    let amount = cleaned
        .trim()
        .parse::<u32>()
        .map_err(|_| format!("\"{}\" is not a whole number of rupees.", text.trim()))?;
    if amount < min_budget {
        return Err(format!("Budget must be at least ₹{min_budget}."));
    }
    Ok(amount)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn listing(title: &str, price: f64, site: &str) -> ProductListing {
        ProductListing {
            title: title.to_string(),
            price,
            site: site.to_string(),
            url: format!("https://www.amazon.in/s?k={}", urlencoding::encode(title)),
        }
    }

    #[test]
    fn truncation_is_char_safe_and_bounded() {
        let text = "₹".repeat(200);
        let truncated = truncate_message(&text, 100);
        assert!(truncated.chars().count() <= 100);
        assert!(truncated.ends_with("(Response was truncated due to length)"));
        assert_eq!(truncate_message("short", 100), "short");
    }

    #[test]
    fn long_product_list_is_cut_between_lines() {
        let products: Vec<ProductListing> = (0..40)
            .map(|n| listing(&format!("Banarasi Silk Saree {n}"), 1500.0, "Amazon"))
            .collect();
        let reply = search_reply(&products, &[], 2000);
        assert!(reply.chars().count() > 600);

        let truncated = truncate_at_line(&reply, 600).expect("first lines fit");
        assert!(truncated.chars().count() <= 600);
        assert!(truncated.starts_with("<b>Similar outfits found</b>"));
        assert!(truncated.ends_with("(Response was truncated due to length)"));
        assert_eq!(truncated.matches("<b>").count(), truncated.matches("</b>").count());
        assert_eq!(truncated.matches("<a ").count(), truncated.matches("</a>").count());
    }

    #[test]
    fn line_truncation_gives_up_on_one_huge_line() {
        let line = format!("<b>{}</b>", "x".repeat(500));
        assert!(truncate_at_line(&line, 100).is_none());
        assert_eq!(truncate_at_line("short", 100).as_deref(), Some("short"));
    }

    #[test]
    fn image_notices_follow_failure_kind() {
        assert_eq!(
            design_image_notice(&OutfitError::HttpStatus(503)),
            "Image generation failed: HTTP 503"
        );
        assert!(design_image_notice(&OutfitError::InvalidImage { len: 5 }).contains("invalid data"));
        assert!(design_image_notice(&OutfitError::Timeout).contains("timed out"));
    }

    #[test]
    fn search_notices() {
        assert!(search_notice(&SearchOutcome::Found {
            listings: Vec::new(),
            rejected: Vec::new()
        })
        .is_none());
        assert_eq!(
            search_notice(&SearchOutcome::NoProducts).as_deref(),
            Some("No products found. Try a different search.")
        );

        let parse = SearchOutcome::Fallback {
            listings: Vec::new(),
            cause: OutfitError::Extraction(ExtractionFailure::NoJsonFound),
        };
        assert!(search_notice(&parse)
            .expect("notice")
            .contains("Showing dummy products instead."));

        let bad_entry = SearchOutcome::Fallback {
            listings: Vec::new(),
            cause: OutfitError::Extraction(ExtractionFailure::ElementNotAnObject { index: 0 }),
        };
        assert_eq!(
            search_notice(&bad_entry).as_deref(),
            Some("Search error: product entry 0 is not a JSON object")
        );

        let transport = SearchOutcome::Fallback {
            listings: Vec::new(),
            cause: OutfitError::Timeout,
        };
        assert_eq!(
            search_notice(&transport).as_deref(),
            Some("Search error: upstream request timed out")
        );
    }

    #[test]
    fn prices_drop_needless_decimals() {
        assert_eq!(format_price(1299.0), "1299");
        assert_eq!(format_price(999.5), "999.50");
    }

    #[test]
    fn search_reply_escapes_titles() {
        let products = vec![listing("Silk <Saree> & Dupatta", 1500.0, "Amazon")];
        let reply = search_reply(&products, &[], 2000);
        assert!(reply.starts_with("<b>Similar outfits found</b>"));
        assert!(reply.contains("<b>Silk &lt;Saree&gt; &amp; Dupatta</b>"));
        assert!(reply.contains("₹1500 · Amazon"));
    }

    #[test]
    fn empty_search_reply_mentions_budget() {
        let reply = search_reply(&[], &[], 800);
        assert!(reply.contains("₹800"));

        let notices = vec!["No products found. Try a different search.".to_string()];
        assert_eq!(
            search_reply(&[], &notices, 800),
            "⚠️ No products found. Try a different search."
        );
    }

    #[test]
    fn design_reply_keeps_text_and_warnings() {
        let notices = vec!["Image generation timed out. Please try again.".to_string()];
        let reply = design_reply("A navy saree.", &notices);
        assert_eq!(
            reply,
            "A navy saree.\n\n⚠️ Image generation timed out. Please try again."
        );
        assert!(design_reply("", &[]).starts_with("No design"));
    }

    #[test]
    fn budget_parsing() {
        assert_eq!(parse_budget("1500", 100), Ok(1500));
        assert_eq!(parse_budget(" ₹2,500 ", 100), Ok(2500));
        assert!(parse_budget("99", 100).is_err());
        assert!(parse_budget("cheap", 100).is_err());
        assert!(parse_budget("-5", 100).is_err());
    }
}
