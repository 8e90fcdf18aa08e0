mod traits;
mod web;
mod web_search;
mod page_fetch;

pub use traits::*;
pub use web_search::WebSearchTool;
pub use page_fetch::PageFetchTool;
