pub mod page;
pub mod page_cache;
