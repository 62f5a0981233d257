pub mod anthropic;
pub mod brave;
pub mod cache;
pub mod router;
pub mod strategy;
pub mod types;

pub use cache::SearchCache;
pub use router::SearchRouter;
pub use strategy::SearchStrategy;
pub use types::{
    ProviderStats, SearchError, SearchParameters, SearchResponse, SearchResult,
    StrategyCapabilities,
};
