//! Schema & view setup, run once per process start.
//!
//! Steps run in order: ensure the database exists, ensure the table exists,
//! recreate every view. The first two are idempotent; the third is a full
//! redefinition. A rejected view is reported and the others still get created.

use crate::{
    error::{StoreError, ViewCreationError},
    store::{DatabaseTarget, SharedStore},
    views::ViewCatalog,
};

#[derive(Debug, Default)]
pub struct SetupReport {
    pub views_created: usize,
    pub view_failures: Vec<ViewCreationError>,
}

impl SetupReport {
    pub fn is_complete(&self) -> bool {
        self.view_failures.is_empty()
    }
}

/// Run the setup on a dedicated connection, closed before returning.
pub async fn initialize(
    target: &DatabaseTarget,
    catalog: &ViewCatalog,
) -> Result<SetupReport, StoreError> {
    let store = SharedStore::open(target.clone()).await?;
    initialize_store(&store, catalog).await
}

/// Run the setup on an already open store.
pub async fn initialize_store(
    store: &SharedStore,
    catalog: &ViewCatalog,
) -> Result<SetupReport, StoreError> {
    store.ensure_table().await?;
    tracing::info!("Created database tables based on schema");

    let view_failures = store.recreate_views(catalog.clone()).await?;
    for failure in &view_failures {
        tracing::error!(view = %failure.view, error = %failure.source, "Error creating view");
    }

    let views_created = catalog.len() - view_failures.len();
    if view_failures.is_empty() {
        tracing::info!(count = views_created, "Created database views");
    } else {
        tracing::warn!(
            created = views_created,
            failed = view_failures.len(),
            "Database views partially created"
        );
    }

    Ok(SetupReport {
        views_created,
        view_failures,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::WeatherStore;

    #[tokio::test]
    async fn creates_table_and_all_views() {
        let store = SharedStore::new(WeatherStore::open_in_memory().unwrap());

        let report = initialize_store(&store, &ViewCatalog::standard()).await.unwrap();

        assert!(report.is_complete());
        assert_eq!(report.views_created, 10);
        assert_eq!(store.row_count().await.unwrap(), 0);
    }

    #[tokio::test]
    async fn view_failure_does_not_abort_setup() {
        let store = SharedStore::new(WeatherStore::open_in_memory().unwrap());
        let catalog = ViewCatalog::standard().with_custom("broken", "SELECT FROM");

        let report = initialize_store(&store, &catalog).await.unwrap();

        assert_eq!(report.views_created, 10);
        assert_eq!(report.view_failures.len(), 1);
        assert_eq!(report.view_failures[0].view, "broken");
        assert_eq!(store.row_count().await.unwrap(), 0);
    }
}
