use anyhow::Context;
use clap::{Parser, Subcommand};
use inquire::{Password, Text};
use weather_collector_core::{
    FileConfig, Settings, SharedStore, SqlDialect, ViewCatalog, ViewRows, initialize,
    run_pipeline,
};

use crate::logging;

/// Top-level CLI struct.
#[derive(Debug, Parser)]
#[command(name = "weather-collector", version, about = "Collect current weather into SQLite")]
pub struct Cli {
    #[command(subcommand)]
    pub command: Command,
}

#[derive(Debug, Subcommand)]
pub enum Command {
    /// Fetch every configured location once and store the observations.
    Run,

    /// Create the database, table and views without fetching anything.
    Init,

    /// List the derived views.
    Views {
        /// Print each view's SQL as well.
        #[arg(long)]
        sql: bool,
    },

    /// Print the current contents of a view.
    Report {
        /// View name, see `weather-collector views`.
        view: String,

        /// One JSON object per row instead of a table.
        #[arg(long)]
        json: bool,
    },

    /// Interactively write the settings file.
    Configure,
}

impl Cli {
    pub async fn run(self) -> anyhow::Result<()> {
        match self.command {
            Command::Run => {
                let settings = load_settings()?;
                tracing::info!("Starting program");

                let summary = run_pipeline(&settings).await.inspect_err(|e| {
                    tracing::error!(error = %e, "Run aborted");
                })?;

                println!(
                    "Stored {} of {} locations ({} fetch failures, {} write failures) in {:.2}s",
                    summary.inserted,
                    summary.locations,
                    summary.fetch_failures,
                    summary.write_failures,
                    summary.elapsed.as_secs_f64(),
                );
            }
            Command::Init => {
                let settings = load_settings()?;
                let report = initialize(&settings.database, &ViewCatalog::standard())
                    .await
                    .inspect_err(|e| tracing::error!(error = %e, "Database setup failed"))?;

                println!(
                    "Database ready: {} views created, {} failed",
                    report.views_created,
                    report.view_failures.len()
                );
            }
            Command::Views { sql } => {
                let catalog = ViewCatalog::standard();
                for view in catalog.iter() {
                    println!("{}", view.name);
                    if sql {
                        println!("    {}\n", view.query(&SqlDialect::default()));
                    }
                }
            }
            Command::Report { view, json } => {
                let settings = load_settings()?;
                let store = SharedStore::open(settings.database.clone()).await?;
                let rows = store
                    .query_view(ViewCatalog::standard(), view.clone())
                    .await
                    .with_context(|| format!("Failed to query view `{view}`"))?;

                if json {
                    for row in rows.to_json() {
                        println!("{}", serde_json::Value::Object(row));
                    }
                } else {
                    print_table(&rows);
                }
            }
            Command::Configure => configure()?,
        }

        Ok(())
    }
}

/// Load settings, then install logging where they say.
///
/// A configuration error is logged to stderr since the log file is not known yet.
fn load_settings() -> anyhow::Result<Settings> {
    match Settings::load() {
        Ok(settings) => {
            logging::init(settings.log_file.as_deref())?;
            tracing::info!(?settings, "Loaded settings");
            Ok(settings)
        }
        Err(e) => {
            logging::init(None)?;
            tracing::error!(error = %e, "Failed to load settings");
            Err(e.into())
        }
    }
}

fn print_table(rows: &ViewRows) {
    if rows.rows.is_empty() {
        println!("(no rows)");
        return;
    }

    let cells: Vec<Vec<String>> = rows
        .to_json()
        .into_iter()
        .map(|row| {
            rows.columns
                .iter()
                .map(|c| match &row[c] {
                    serde_json::Value::String(s) => s.clone(),
                    serde_json::Value::Number(n) => match n.as_f64() {
                        Some(f) if !n.is_i64() => format!("{f:.2}"),
                        _ => n.to_string(),
                    },
                    other => other.to_string(),
                })
                .collect()
        })
        .collect();

    let widths: Vec<usize> = rows
        .columns
        .iter()
        .enumerate()
        .map(|(i, c)| {
            cells
                .iter()
                .map(|r| display_width(&r[i]))
                .chain([display_width(c)])
                .max()
                .unwrap_or(0)
        })
        .collect();

    let line = |values: &[String]| {
        values
            .iter()
            .zip(&widths)
            .map(|(v, &w)| format!("{v:<w$}"))
            .collect::<Vec<_>>()
            .join("  ")
    };

    println!("{}", line(&rows.columns));
    for row in &cells {
        println!("{}", line(row));
    }
}

/// Width in characters, which is what `{:<w$}` pads to.
fn display_width(s: &str) -> usize {
    s.chars().count()
}

fn configure() -> anyhow::Result<()> {
    let mut cfg = FileConfig::load()?;

    let api_key = Password::new("OpenWeather API key:")
        .without_confirmation()
        .with_help_message("Leave empty to keep the current key")
        .prompt()?;
    if !api_key.trim().is_empty() {
        cfg.api_key = Some(api_key.trim().to_string());
    }

    let connection = Text::new("Database connection string:")
        .with_default(cfg.connection_string.as_deref().unwrap_or("sqlite://weather.db"))
        .prompt()?;
    cfg.connection_string = Some(connection);

    let cities = Text::new("Locations file (one `city,country` per line):")
        .with_initial_value(
            &cfg.cities_file
                .as_ref()
                .map(|p| p.display().to_string())
                .unwrap_or_default(),
        )
        .prompt()?;
    cfg.cities_file = (!cities.trim().is_empty()).then(|| cities.trim().into());

    let log_file = Text::new("Log file:")
        .with_help_message("Leave empty to log to stderr")
        .with_initial_value(
            &cfg.log_file
                .as_ref()
                .map(|p| p.display().to_string())
                .unwrap_or_default(),
        )
        .prompt()?;
    cfg.log_file = (!log_file.trim().is_empty()).then(|| log_file.trim().into());

    let path = cfg.save()?;
    println!("Settings saved to {}", path.display());

    Ok(())
}
