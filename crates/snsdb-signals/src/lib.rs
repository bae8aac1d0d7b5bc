//! Pure decision logic for the ingest pipeline: keyword rotation, creator
//! classification, discovery/refresh gating and follower-growth trends.

pub mod classifier;
pub mod gates;
pub mod rotation;
pub mod tags;
pub mod trend;

pub use classifier::{classify, is_target_creator, ProfileText, Rejection, Verdict};
pub use gates::{needs_discovery, needs_posts_refresh};
pub use rotation::{
    pick, CycleState, CycleStateRepo, FileCycleState, KeywordRotation, RotationError,
};
pub use tags::extract_hashtags;
pub use trend::{evaluate_trend, is_trending, TrendVerdict};
