//! Fetch coordinator: one request per location, all outcomes collected.

use futures::{StreamExt, stream};
use serde_json::Value;

use crate::{error::FetchError, locations::Location, provider::WeatherSource};

pub const DEFAULT_FETCH_CONCURRENCY: usize = 16;

/// What happened to one location's request.
#[derive(Debug)]
pub struct FetchOutcome {
    pub location: Location,
    pub result: Result<Value, FetchError>,
}

impl FetchOutcome {
    pub fn is_success(&self) -> bool {
        self.result.is_ok()
    }
}

/// Issues one request per location concurrently and waits for all of them.
///
/// A failed request never cancels its peers. At most `max_concurrency`
/// requests are in flight at once; outcomes come back in input order.
#[derive(Debug)]
pub struct FetchCoordinator<S> {
    source: S,
    max_concurrency: usize,
}

impl<S: WeatherSource> FetchCoordinator<S> {
    pub fn new(source: S, max_concurrency: usize) -> Self {
        Self {
            source,
            max_concurrency: max_concurrency.max(1),
        }
    }

    pub fn source(&self) -> &S {
        &self.source
    }

    pub async fn fetch_all(&self, locations: &[Location]) -> Vec<FetchOutcome> {
        tracing::info!(
            count = locations.len(),
            max_concurrency = self.max_concurrency,
            "Fetching weather data"
        );

        stream::iter(locations.iter().cloned())
            .map(|location| async move {
                tracing::debug!(%location, "Requesting current weather");
                let result = self.source.fetch_current(&location).await;
                FetchOutcome { location, result }
            })
            .buffered(self.max_concurrency)
            .collect()
            .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use serde_json::json;
    use std::sync::atomic::{AtomicUsize, Ordering};

    #[derive(Debug, Default)]
    struct FakeSource {
        calls: AtomicUsize,
        in_flight: AtomicUsize,
        max_in_flight: AtomicUsize,
    }

    #[async_trait]
    impl WeatherSource for FakeSource {
        async fn fetch_current(&self, location: &Location) -> Result<Value, FetchError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            let now = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
            self.max_in_flight.fetch_max(now, Ordering::SeqCst);

            tokio::task::yield_now().await;
            self.in_flight.fetch_sub(1, Ordering::SeqCst);

            if location.city == "Paris" {
                return Err(FetchError::Status {
                    status: 500,
                    body: "internal error".into(),
                });
            }
            Ok(json!({ "name": location.city }))
        }
    }

    fn locations(cities: &[&str]) -> Vec<Location> {
        cities.iter().map(|c| Location::new(*c, "XX")).collect()
    }

    #[tokio::test]
    async fn one_outcome_per_location_in_input_order() {
        let coordinator = FetchCoordinator::new(FakeSource::default(), 4);
        let input = locations(&["London", "Paris", "Berlin"]);

        let outcomes = coordinator.fetch_all(&input).await;

        assert_eq!(coordinator.source().calls.load(Ordering::SeqCst), 3);
        assert_eq!(outcomes.len(), 3);
        for (outcome, location) in outcomes.iter().zip(&input) {
            assert_eq!(&outcome.location, location);
        }
    }

    #[tokio::test]
    async fn failure_does_not_cancel_peers() {
        let coordinator = FetchCoordinator::new(FakeSource::default(), 4);

        let outcomes = coordinator
            .fetch_all(&locations(&["London", "Paris", "Berlin"]))
            .await;

        assert!(outcomes[0].is_success());
        assert!(matches!(
            outcomes[1].result,
            Err(FetchError::Status { status: 500, .. })
        ));
        assert!(outcomes[2].is_success());
    }

    #[tokio::test]
    async fn in_flight_requests_are_bounded() {
        let coordinator = FetchCoordinator::new(FakeSource::default(), 2);

        let outcomes = coordinator
            .fetch_all(&locations(&["A", "B", "C", "D", "E"]))
            .await;

        assert_eq!(outcomes.len(), 5);
        assert_eq!(coordinator.source().max_in_flight.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn empty_input_makes_no_requests() {
        let coordinator = FetchCoordinator::new(FakeSource::default(), 0);

        assert!(coordinator.fetch_all(&[]).await.is_empty());
        assert_eq!(coordinator.source().calls.load(Ordering::SeqCst), 0);
    }
}
