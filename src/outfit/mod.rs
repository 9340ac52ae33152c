pub mod catalog;
pub mod design;
pub mod error;
pub mod extract;
pub mod illustration;
pub mod links;
pub mod search;
pub mod tagging;
pub mod types;

pub use design::generate_design_text;
pub use illustration::render_design_image;
pub use search::search_products;
pub use tagging::extract_outfit_tags;
