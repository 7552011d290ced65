//! One collection run: locations → setup → fetch → persist.

use std::time::{Duration, Instant};

use serde::Serialize;

use crate::{
    config::Settings,
    error::PipelineError,
    fetch::FetchCoordinator,
    locations::read_locations,
    provider::{OpenWeatherClient, WeatherSource},
    setup::initialize,
    store::SharedStore,
    views::ViewCatalog,
    writer::PersistenceWriter,
};

/// Counts of what happened during a run.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct RunSummary {
    pub locations: usize,
    pub fetched: usize,
    pub fetch_failures: usize,
    pub inserted: usize,
    pub write_failures: usize,
    pub view_failures: usize,
    pub elapsed: Duration,
}

/// Run against the configured OpenWeather endpoint.
pub async fn run_pipeline(settings: &Settings) -> Result<RunSummary, PipelineError> {
    let source = OpenWeatherClient::with_base_url(settings.api_key.clone(), settings.api_url.clone());
    run_with_source(settings, source).await
}

/// Run with any weather source.
///
/// Only an unreadable locations file or a database that cannot be set up
/// fails the run; per-location and per-record failures are logged and counted.
pub async fn run_with_source<S: WeatherSource>(
    settings: &Settings,
    source: S,
) -> Result<RunSummary, PipelineError> {
    let started = Instant::now();

    let locations = read_locations(&settings.cities_file)?;
    let setup = initialize(&settings.database, &ViewCatalog::standard()).await?;

    let mut summary = RunSummary {
        locations: locations.len(),
        view_failures: setup.view_failures.len(),
        ..RunSummary::default()
    };

    let coordinator = FetchCoordinator::new(source, settings.fetch_concurrency);
    let mut fetched = Vec::with_capacity(locations.len());
    for outcome in coordinator.fetch_all(&locations).await {
        match outcome.result {
            Ok(body) => fetched.push((outcome.location, body)),
            Err(e) => {
                summary.fetch_failures += 1;
                tracing::error!(location = %outcome.location, error = %e, "Error fetching weather data");
            }
        }
    }
    summary.fetched = fetched.len();
    tracing::info!(
        fetched = summary.fetched,
        failed = summary.fetch_failures,
        "Fetched weather data"
    );

    if !fetched.is_empty() {
        let writer = PersistenceWriter::new(SharedStore::open(settings.database_async.clone()).await?);

        for report in writer.write_batch(fetched).await {
            match report.result {
                Ok(_) => {
                    summary.inserted += 1;
                    tracing::info!(location = %report.location, "Weather data inserted");
                }
                Err(e) => {
                    summary.write_failures += 1;
                    tracing::error!(location = %report.location, error = %e, "Error inserting weather data");
                }
            }
        }
    }

    summary.elapsed = started.elapsed();
    tracing::info!(
        locations = summary.locations,
        inserted = summary.inserted,
        fetch_failures = summary.fetch_failures,
        write_failures = summary.write_failures,
        view_failures = summary.view_failures,
        elapsed_secs = summary.elapsed.as_secs_f64(),
        "Run completed"
    );

    Ok(summary)
}
