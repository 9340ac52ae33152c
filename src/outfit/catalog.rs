use crate::outfit::links::listing_url;
use crate::outfit::types::ProductListing;

/// (title, base price in INR, site used when the caller supplies too few)
const FALLBACK_ARCHETYPES: [(&str, u32, &str); 3] = [
    ("Premium Silk Saree", 1800, "Amazon"),
    ("Designer Ethnic Wear", 2500, "Myntra"),
    ("Traditional Organza Saree", 2200, "Ajio"),
];

/// Placeholder listings shown when product search cannot produce real ones.
///
/// Pure and deterministic: equal inputs give equal output.
pub fn dummy_catalog(budget: u32, sites: &[String]) -> Vec<ProductListing> {
    FALLBACK_ARCHETYPES
        .iter()
        .enumerate()
        .map(|(index, (title, base_price, default_site))| {
            let site = sites
                .get(index)
                .map(|site| site.as_str())
                .unwrap_or(*default_site);
            ProductListing {
                title: title.to_string(),
                price: f64::from((*base_price).min(budget)),
                site: site.to_string(),
                url: listing_url(site, title),
            }
        })
        .filter(|listing| listing.price <= f64::from(budget))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sites(names: &[&str]) -> Vec<String> {
        names.iter().map(|name| name.to_string()).collect()
    }

    #[test]
    fn caps_prices_at_budget() {
        let listings = dummy_catalog(2000, &sites(&["Amazon", "Myntra", "Ajio", "Flipkart"]));
        let prices: Vec<f64> = listings.iter().map(|listing| listing.price).collect();
        assert_eq!(prices, vec![1800.0, 2000.0, 2000.0]);
    }

    #[test]
    fn assigns_sites_in_order_and_fills_defaults() {
        let listings = dummy_catalog(5000, &sites(&["Flipkart"]));
        let assigned: Vec<&str> = listings.iter().map(|listing| listing.site.as_str()).collect();
        assert_eq!(assigned, vec!["Flipkart", "Myntra", "Ajio"]);
        assert_eq!(
            listings[0].url,
            "https://www.flipkart.com/search?q=Premium%20Silk%20Saree"
        );

        let defaults = dummy_catalog(5000, &[]);
        let assigned: Vec<&str> = defaults.iter().map(|listing| listing.site.as_str()).collect();
        assert_eq!(assigned, vec!["Amazon", "Myntra", "Ajio"]);
    }

    #[test]
    fn unknown_site_uses_web_search_link() {
        let listings = dummy_catalog(3000, &sites(&["Meesho"]));
        assert_eq!(
            listings[0].url,
            "https://www.google.com/search?q=Premium%20Silk%20Saree"
        );
    }

    #[test]
    fn small_budget_keeps_every_listing_within_budget() {
        let listings = dummy_catalog(100, &sites(&["Amazon", "Myntra", "Ajio"]));
        assert_eq!(listings.len(), 3);
        assert!(listings.iter().all(|listing| listing.price <= 100.0));
    }

    #[test]
    fn is_idempotent() {
        let shop = sites(&["Amazon", "Myntra", "Ajio", "Flipkart"]);
        assert_eq!(dummy_catalog(1500, &shop), dummy_catalog(1500, &shop));
    }
}
