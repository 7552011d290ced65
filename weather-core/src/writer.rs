use serde_json::Value;

use crate::{
    error::WriteError, locations::Location, mapper::map_response, store::SharedStore,
};

/// Outcome of persisting one location's response.
#[derive(Debug)]
pub struct WriteReport {
    pub location: Location,
    /// Row id of the inserted record.
    pub result: Result<i64, WriteError>,
}

/// Maps raw responses and commits each as its own single-row transaction.
#[derive(Debug, Clone)]
pub struct PersistenceWriter {
    store: SharedStore,
}

impl PersistenceWriter {
    pub fn new(store: SharedStore) -> Self {
        Self { store }
    }

    pub fn store(&self) -> &SharedStore {
        &self.store
    }

    /// Map and insert one response. On failure nothing is committed.
    pub async fn write(&self, raw: &Value) -> Result<i64, WriteError> {
        let record = map_response(raw)?;
        let id = self.store.insert(record).await?;
        tracing::debug!(id, "Weather record inserted");
        Ok(id)
    }

    /// Write every response independently; one failure never stops the rest.
    pub async fn write_batch<I>(&self, responses: I) -> Vec<WriteReport>
    where
        I: IntoIterator<Item = (Location, Value)>,
    {
        let mut reports = Vec::new();
        for (location, raw) in responses {
            let result = self.write(&raw).await;
            reports.push(WriteReport { location, result });
        }
        reports
    }
}
