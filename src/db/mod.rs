pub mod cache;
pub mod profiles;

pub use cache::{CacheKey, ResponseCache};
pub use profiles::{InterestSource, ProfileStore};
