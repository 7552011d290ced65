//! Core library for the `weather-collector` tool.
//!
//! This crate defines:
//! - Configuration & locations file handling
//! - The OpenWeather client and the concurrent fetch coordinator
//! - Mapping of raw API responses into [`WeatherRecord`]s
//! - SQLite persistence, the table schema and the derived view catalog
//! - The pipeline driver tying those together for one run
//!
//! It is used by `weather-collector`, but can also be reused by other binaries or services.

pub mod config;
pub mod error;
pub mod fetch;
pub mod locations;
pub mod mapper;
pub mod model;
pub mod pipeline;
pub mod provider;
pub mod schema;
pub mod setup;
pub mod store;
pub mod views;
pub mod writer;

pub use config::{FileConfig, Settings};
pub use error::{
    ConfigError, FetchError, LocationFileError, MalformedResponseError, PipelineError, StoreError,
    ViewCreationError, WriteError,
};
pub use fetch::{FetchCoordinator, FetchOutcome};
pub use locations::{Location, read_locations};
pub use mapper::map_response;
pub use model::WeatherRecord;
pub use pipeline::{RunSummary, run_pipeline, run_with_source};
pub use provider::{OpenWeatherClient, WeatherSource};
pub use setup::{SetupReport, initialize, initialize_store};
pub use store::{DatabaseTarget, SharedStore, ViewRows, WeatherStore};
pub use views::{SqlDialect, ViewCatalog, ViewDefinition};
pub use writer::{PersistenceWriter, WriteReport};
