pub mod extract;
pub mod fetcher;

pub use extract::{SelectorExtractor, validate_selectors};
pub use fetcher::ReqwestFetcher;
