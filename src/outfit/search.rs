use anyhow::Result;
use serde_json::Value;
use tracing::{debug, info, warn};

use crate::config::{CONFIG, SEARCH_PROMPT_TEMPLATE};
use crate::llm::gemini::generate_text;
use crate::outfit::catalog::dummy_catalog;
use crate::outfit::error::{ExtractionFailure, OutfitError};
use crate::outfit::extract::parse_json_array_span;
use crate::outfit::links::listing_url;
use crate::outfit::types::{ProductListing, SearchRequest};

#[derive(Debug, Clone, PartialEq)]
pub enum RejectionReason {
    PriceNotNumeric,
    OverBudget { price: f64 },
}

#[derive(Debug, Clone, PartialEq)]
pub struct CandidateRejection {
    pub index: usize,
    pub title: String,
    pub reason: RejectionReason,
}

#[derive(Debug)]
pub enum SearchOutcome {
    /// Neither a description nor image tags were available; no call was made.
    NothingToSearch,
    /// The model answered with a product array. `listings` may still be empty
    /// when every candidate was rejected.
    Found {
        listings: Vec<ProductListing>,
        rejected: Vec<CandidateRejection>,
    },
    /// Valid JSON that was not a product array, or an empty array.
    NoProducts,
    /// The call or the parse failed, or an array entry was not an object;
    /// `listings` is the placeholder catalog.
    Fallback {
        listings: Vec<ProductListing>,
        cause: OutfitError,
    },
}

impl SearchOutcome {
    pub fn listings(&self) -> &[ProductListing] {
        match self {
            SearchOutcome::Found { listings, .. } | SearchOutcome::Fallback { listings, .. } => {
                listings
            }
            SearchOutcome::NothingToSearch | SearchOutcome::NoProducts => &[],
        }
    }

    pub fn into_listings(self) -> Vec<ProductListing> {
        match self {
            SearchOutcome::Found { listings, .. } | SearchOutcome::Fallback { listings, .. } => {
                listings
            }
            SearchOutcome::NothingToSearch | SearchOutcome::NoProducts => Vec::new(),
        }
    }
}

pub fn search_prompt(request: &SearchRequest) -> String {
    SEARCH_PROMPT_TEMPLATE
        .replace("{description}", &request.combined_description())
        .replace("{filters}", &request.extra_filters)
        .replace("{budget}", &request.budget.to_string())
        .replace("{sites}", &request.candidate_sites.join(", "))
}

/// JSON numbers, or strings holding a finite decimal. Anything else is not a
/// usable price.
pub fn coerce_price(value: Option<&Value>) -> Option<f64> {
    let price = match value? {
        Value::Number(number) => number.as_f64()?,
        Value::String(text) => text.trim().parse::<f64>().ok()?,
        _ => return None,
    };
    price.is_finite().then_some(price)
}

fn text_field(object: &serde_json::Map<String, Value>, key: &str) -> String {
    match object.get(key) {
        Some(Value::String(text)) => text.trim().to_string(),
        Some(Value::Null) | None => String::new(),
        Some(other) => other.to_string(),
    }
}

/// Keeps the candidates priced within `budget` and gives each its link.
///
/// Any entry that is not an object fails the whole array.
pub fn screen_candidates(
    items: &[Value],
    budget: u32,
) -> Result<(Vec<ProductListing>, Vec<CandidateRejection>), ExtractionFailure> {
    let budget = f64::from(budget);
    let mut listings = Vec::new();
    let mut rejected = Vec::new();

    for (index, item) in items.iter().enumerate() {
        let object = item
            .as_object()
            .ok_or(ExtractionFailure::ElementNotAnObject { index })?;

        let title = text_field(object, "title");
        let price = match coerce_price(object.get("price")) {
            Some(price) => price,
            None => {
                // Unusable prices count as one over budget.
                rejected.push(CandidateRejection {
                    index,
                    title,
                    reason: RejectionReason::PriceNotNumeric,
                });
                continue;
            }
        };
        if price > budget {
            rejected.push(CandidateRejection {
                index,
                title,
                reason: RejectionReason::OverBudget { price },
            });
            continue;
        }

        let site = text_field(object, "site");
        let url = listing_url(&site, &title);
        listings.push(ProductListing {
            title,
            price,
            site,
            url,
        });
    }

    Ok((listings, rejected))
}

/// Maps the model call result onto a search outcome.
pub fn resolve_search_response(response: Result<String>, request: &SearchRequest) -> SearchOutcome {
    let fallback = |cause: OutfitError| SearchOutcome::Fallback {
        listings: dummy_catalog(request.budget, &request.candidate_sites),
        cause,
    };

    let text = match response {
        Ok(text) => text,
        Err(err) => {
            warn!("Product search request failed: {err}");
            return fallback(OutfitError::from(err));
        }
    };

    let value = match parse_json_array_span(&text) {
        Ok(value) => value,
        Err(failure) => {
            warn!("Product search response could not be parsed: {failure}");
            return fallback(OutfitError::Extraction(failure));
        }
    };

    match value {
        Value::Array(items) if !items.is_empty() => {
            let (listings, rejected) = match screen_candidates(&items, request.budget) {
                Ok(screened) => screened,
                Err(failure) => {
                    warn!("Product search response has an unusable entry: {failure}");
                    return fallback(OutfitError::Extraction(failure));
                }
            };
            for rejection in &rejected {
                debug!(
                    target: "outfit.search",
                    index = rejection.index,
                    title = %rejection.title,
                    reason = ?rejection.reason,
                    "candidate rejected"
                );
            }
            info!(
                "Product search kept {} of {} candidate(s) within budget {}",
                listings.len(),
                items.len(),
                request.budget
            );
            SearchOutcome::Found { listings, rejected }
        }
        _ => SearchOutcome::NoProducts,
    }
}

/// Asks the model for shoppable products matching the request.
pub async fn search_products(request: &SearchRequest) -> SearchOutcome {
    if !request.has_subject() {
        return SearchOutcome::NothingToSearch;
    }

    let prompt = search_prompt(request);
    let response = generate_text(&prompt, CONFIG.search_temperature, "product_search").await;
    resolve_search_response(response, request)
}
