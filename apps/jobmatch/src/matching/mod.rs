// Match resolution: pluggable strategies plus the cache-first resolver with a
// single fallback. All backend calls go through backend::BackendClient.

pub mod resolver;
pub mod strategy;

pub use self::resolver::{FallbackResolver, Resolution};
pub use self::strategy::{AiMatchStrategy, MatchQuery, MatchStrategy, StandardMatchStrategy};
