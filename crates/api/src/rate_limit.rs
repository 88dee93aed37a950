//! Rate Limiting for the upload endpoint using the GCRA Algorithm
//!
//! On-demand analysis runs a full inference per request, so uploads are
//! limited per peer IP with tower_governor.

use governor::middleware::StateInformationMiddleware;
use serde::Deserialize;
use std::sync::Arc;
use tower_governor::governor::GovernorConfigBuilder;
use tower_governor::key_extractor::PeerIpKeyExtractor;
use tower_governor::GovernorLayer;

/// Per-peer upload quota. Responses carry `x-ratelimit-*` headers.
pub type UploadGovernorConfig =
    tower_governor::governor::GovernorConfig<PeerIpKeyExtractor, StateInformationMiddleware>;

/// Layer applied to the upload route
pub type UploadLimiter = GovernorLayer<PeerIpKeyExtractor, StateInformationMiddleware>;

/// Rate limiting configuration
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct RateLimitConfig {
    /// Seconds to replenish one request
    pub per_second: u64,
    /// Burst size (max requests that can be made immediately)
    pub burst_size: u32,
}

impl Default for RateLimitConfig {
    fn default() -> Self {
        Self {
            per_second: 2,  // Replenish every 2 seconds, same as the capture cadence
            burst_size: 5,
        }
    }
}

/// Create a rate limiting governor config
///
/// Uses PeerIpKeyExtractor, so the service must be served with
/// `into_make_service_with_connect_info::<SocketAddr>()`.
/// Returns `None` when the quota is invalid (zero period or burst).
pub fn create_governor_config(config: &RateLimitConfig) -> Option<Arc<UploadGovernorConfig>> {
    GovernorConfigBuilder::default()
        .per_second(config.per_second)
        .burst_size(config.burst_size)
        .use_headers()  // Adds X-RateLimit-After, X-RateLimit-Limit, X-RateLimit-Remaining
        .finish()
        .map(Arc::new)
}
