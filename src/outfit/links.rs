//! Outbound marketplace search links.

/// `{q}` is replaced by the percent-encoded listing title.
struct MarketplaceLink {
    fragment: &'static str,
    template: &'static str,
}

// Evaluated top to bottom; the first fragment contained in the site name wins.
const MARKETPLACE_LINKS: [MarketplaceLink; 4] = [
    MarketplaceLink {
        fragment: "amazon",
        template: "https://www.amazon.in/s?k={q}",
    },
    MarketplaceLink {
        fragment: "myntra",
        template: "https://www.myntra.com/{q}?rawQuery={q}",
    },
    MarketplaceLink {
        fragment: "ajio",
        template: "https://www.ajio.com/search/?text={q}",
    },
    MarketplaceLink {
        fragment: "flipkart",
        template: "https://www.flipkart.com/search?q={q}",
    },
];

const UNMATCHED_TEMPLATE: &str = "https://www.google.com/search?q={q}";

fn template_for_site(site: &str) -> &'static str {
    let site = site.to_lowercase();
    MARKETPLACE_LINKS
        .iter()
        .find(|link| site.contains(link.fragment))
        .map(|link| link.template)
        .unwrap_or(UNMATCHED_TEMPLATE)
}

pub fn listing_url(site: &str, title: &str) -> String {
    let query = urlencoding::encode(title);
    template_for_site(site).replace("{q}", &query)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn known_sites_use_their_templates() {
        assert_eq!(
            listing_url("Amazon", "Silk Saree"),
            "https://www.amazon.in/s?k=Silk%20Saree"
        );
        assert_eq!(
            listing_url("Myntra", "Silk Saree"),
            "https://www.myntra.com/Silk%20Saree?rawQuery=Silk%20Saree"
        );
        assert_eq!(
            listing_url("Ajio", "Kurta"),
            "https://www.ajio.com/search/?text=Kurta"
        );
        assert_eq!(
            listing_url("Flipkart", "Kurta"),
            "https://www.flipkart.com/search?q=Kurta"
        );
    }

    #[test]
    fn site_case_does_not_change_template() {
        let reference = listing_url("myntra", "Organza Saree");
        assert_eq!(listing_url("MYNTRA", "Organza Saree"), reference);
        assert_eq!(listing_url("MyNtRa", "Organza Saree"), reference);
        assert_eq!(listing_url("shop.myntra.com", "Organza Saree"), reference);
    }

    #[test]
    fn first_declared_fragment_wins() {
        assert_eq!(
            listing_url("Flipkart via Amazon", "Dupatta"),
            "https://www.amazon.in/s?k=Dupatta"
        );
        assert_eq!(
            listing_url("ajio-myntra outlet", "Dupatta"),
            "https://www.myntra.com/Dupatta?rawQuery=Dupatta"
        );
    }

    #[test]
    fn unknown_site_falls_back_to_web_search() {
        assert_eq!(
            listing_url("Meesho", "Lehenga & Choli"),
            "https://www.google.com/search?q=Lehenga%20%26%20Choli"
        );
        assert_eq!(listing_url("", "A"), "https://www.google.com/search?q=A");
    }
}
