use tracing::{debug, warn};

use crate::catalog::DestinationCatalog;
use crate::sync::limiter::RateLimiter;

/// Maps a source track onto the destination catalog by name/artist search.
///
/// Exactly one search call per resolution, followed by the rate gate
/// whatever the outcome. Failures never escape: a transport or decode error
/// is logged and reported as not-found for this attempt.
pub struct TrackResolver {
    limiter: RateLimiter,
}

impl TrackResolver {
    pub fn new(limiter: RateLimiter) -> Self {
        Self { limiter }
    }

    pub async fn resolve<D: DestinationCatalog>(
        &self,
        catalog: &D,
        name: &str,
        artist: &str,
    ) -> Option<String> {
        let outcome = catalog.search_track(name, artist).await;
        self.limiter.wait().await;

        match outcome {
            Ok(Some(id)) => {
                debug!("Resolved '{} - {}' to {}", artist, name, id);
                Some(id)
            }
            Ok(None) => {
                debug!("No match for '{} - {}'", artist, name);
                None
            }
            Err(e) => {
                warn!("Search failed for '{} - {}': {}", artist, name, e);
                None
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use super::*;
    use crate::sync::testing::MockDest;

    #[tokio::test(start_paused = true)]
    async fn test_resolve_found_and_throttled() {
        let dest = MockDest::new();
        dest.script_search("Blue Monday", Some("t1"));

        let resolver = TrackResolver::new(RateLimiter::new(Duration::from_millis(1500)));
        let start = tokio::time::Instant::now();

        let resolved = resolver.resolve(&dest, "Blue Monday", "New Order").await;
        assert_eq!(resolved.as_deref(), Some("t1"));
        assert_eq!(start.elapsed(), Duration::from_millis(1500));
        assert_eq!(dest.search_calls(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_resolve_not_found_still_throttled() {
        let dest = MockDest::new();

        let resolver = TrackResolver::new(RateLimiter::new(Duration::from_millis(1500)));
        let start = tokio::time::Instant::now();

        let resolved = resolver.resolve(&dest, "Obscure B-Side", "Nobody").await;
        assert!(resolved.is_none());
        assert_eq!(start.elapsed(), Duration::from_millis(1500));
    }

    #[tokio::test(start_paused = true)]
    async fn test_search_error_becomes_not_found() {
        let dest = MockDest::new();
        dest.fail_next_searches(1);

        let resolver = TrackResolver::new(RateLimiter::new(Duration::ZERO));
        let resolved = resolver.resolve(&dest, "Anything", "Anyone").await;
        assert!(resolved.is_none());
    }
}
