pub mod actors;
pub mod client;
pub mod error;
pub mod fields;
pub mod normalize;

pub use actors::{actor_call, ActorCall, RunMode, ScrapeQuery};
pub use client::{ApifyClient, Scraper};
pub use error::ScraperError;
pub use normalize::{group_by_author, normalize_posts, normalize_profiles, AuthorActivity};
