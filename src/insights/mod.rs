//! Insights and cross-document insights generation.

mod context;
mod response;

pub use context::{format_hits_for_prompt, ContextBuilder};
pub use response::{Citation, Claim, CrossInsightsResponse, InsightsEngine, InsightsResponse, Source};
