use std::env;

use anyhow::{anyhow, Result};
use once_cell::sync::Lazy;
use tracing::warn;

#[derive(Debug, Clone)]
pub struct Config {
    pub bot_token: String,
    pub log_level: String,
    pub gemini_api_key: String,
    pub gemini_api_base: String,
    pub gemini_model: String,
    pub gemini_timeout_seconds: u64,
    pub gemini_max_attempts: usize,
    pub design_temperature: f32,
    pub tagging_temperature: f32,
    pub search_temperature: f32,
    pub image_endpoint: String,
    pub image_timeout_seconds: u64,
    pub image_min_bytes: usize,
    pub default_budget: u32,
    pub min_budget: u32,
    pub shop_sites: Vec<String>,
    pub rate_limit_seconds: u64,
    pub telegram_max_length: usize,
}

pub static CONFIG: Lazy<Config> =
    Lazy::new(|| Config::load().expect("Failed to load configuration"));

fn env_string(name: &str, default: &str) -> String {
    env::var(name).unwrap_or_else(|_| default.to_string())
}

fn env_f32(name: &str, default: f32) -> f32 {
    env::var(name)
        .ok()
        .and_then(|value| value.parse::<f32>().ok())
        .unwrap_or(default)
}

fn env_u32(name: &str, default: u32) -> u32 {
    env::var(name)
        .ok()
        .and_then(|value| value.trim().parse::<u32>().ok())
        .unwrap_or(default)
}

fn env_u64(name: &str, default: u64) -> u64 {
    env::var(name)
        .ok()
        .and_then(|value| value.trim().parse::<u64>().ok())
        .unwrap_or(default)
}

fn env_usize(name: &str, default: usize) -> usize {
    env::var(name)
        .ok()
        .and_then(|value| value.trim().parse::<usize>().ok())
        .unwrap_or(default)
}

fn env_required(name: &str) -> Result<String> {
    let value = env::var(name).unwrap_or_default();
    if value.trim().is_empty() {
        return Err(anyhow!("{name} is required"));
    }
    Ok(value.trim().to_string())
}

fn parse_csv(value: &str) -> Vec<String> {
    value
        .split(',')
        .map(|entry| entry.trim().to_string())
        .filter(|entry| !entry.is_empty())
        .collect()
}

fn default_shop_sites() -> Vec<String> {
    ["Amazon", "Myntra", "Ajio", "Flipkart"]
        .iter()
        .map(|site| site.to_string())
        .collect()
}

fn normalize_temperature(name: &str, value: f32, default: f32) -> f32 {
    if (0.0..=2.0).contains(&value) {
        return value;
    }
    warn!("{name} value {value} is outside 0.0..=2.0; using {default}.");
    default
}

impl Config {
    pub fn load() -> Result<Self> {
        let bot_token = env_required("BOT_TOKEN")?;
        let gemini_api_key = env_required("GEMINI_API_KEY")?;

        let mut shop_sites = parse_csv(&env_string("SHOP_SITES", ""));
        if shop_sites.is_empty() {
            shop_sites = default_shop_sites();
        }

        let min_budget = env_u32("MIN_BUDGET", 100).max(1);
        let default_budget = env_u32("DEFAULT_BUDGET", 2000).max(min_budget);

        Ok(Config {
            bot_token,
            log_level: env_string("LOG_LEVEL", "info").to_lowercase(),
            gemini_api_key,
            gemini_api_base: env_string(
                "GEMINI_API_BASE",
                "https://generativelanguage.googleapis.com/v1beta",
            )
            .trim_end_matches('/')
            .to_string(),
            gemini_model: env_string("GEMINI_MODEL", "gemini-2.5-flash"),
            gemini_timeout_seconds: env_u64("GEMINI_TIMEOUT_SECONDS", 90),
            gemini_max_attempts: env_usize("GEMINI_MAX_ATTEMPTS", 1).max(1),
            design_temperature: normalize_temperature(
                "DESIGN_TEMPERATURE",
                env_f32("DESIGN_TEMPERATURE", 0.7),
                0.7,
            ),
            tagging_temperature: normalize_temperature(
                "TAGGING_TEMPERATURE",
                env_f32("TAGGING_TEMPERATURE", 0.3),
                0.3,
            ),
            search_temperature: normalize_temperature(
                "SEARCH_TEMPERATURE",
                env_f32("SEARCH_TEMPERATURE", 0.3),
                0.3,
            ),
            image_endpoint: env_string("IMAGE_ENDPOINT", "https://image.pollinations.ai")
                .trim_end_matches('/')
                .to_string(),
            image_timeout_seconds: env_u64("IMAGE_TIMEOUT_SECONDS", 30),
            image_min_bytes: env_usize("IMAGE_MIN_BYTES", 100),
            default_budget,
            min_budget,
            shop_sites,
            rate_limit_seconds: env_u64("RATE_LIMIT_SECONDS", 5),
            telegram_max_length: env_usize("TELEGRAM_MAX_LENGTH", 4000),
        })
    }
}

pub const DESIGN_PROMPT_TEMPLATE: &str = r#"You are a fashion design assistant.
Based on this description, describe a detailed outfit design (colors, fabric, drape, patterns):

"{description}""#;

pub const TAGGING_PROMPT: &str = r#"You are a fashion tagging assistant.
Look at this outfit image and describe it in a compact JSON object.

IMPORTANT:
- Respond with ONLY valid JSON, no markdown, no text outside JSON.
- Keys: "colors", "garment_type", "style", "fabric", "length", "occasion", "fit", "keywords"
- Each value should be a short string, except "keywords" which is a comma-separated string."#;

pub const SEARCH_PROMPT_TEMPLATE: &str = r#"You are a fashion shopping assistant.
Generate a JSON array of fashion products from Indian e-commerce sites.

Outfit description:
"""{description}"""

Extra search filters from user:
"""{filters}"""

Budget (INR): {budget}
Sites (use only in "site" field, do NOT invent API calls): {sites}

TASK:
- Propose realistic fashion products that match the outfit and filters.
- All prices must be <= {budget}.
- Titles should look like real listings from these sites.

IMPORTANT:
- Return ONLY a valid JSON array. No markdown, no extra text.
- Each product must have: "title", "price" (number), "site"."#;

pub const IMAGE_STYLE_DIRECTIVE: &str =
    "High-quality fashion illustration, full body, front view, clean studio background. ";
