/// Key schema cache backed by `describe_table`
///
/// The compiler needs each table's key layout to validate point writes. The
/// cache is filled on first use, registered directly by CREATE TABLE, and
/// evicted by DROP TABLE on this connection.

use dynql_core::dialect::Catalog;
use dynql_core::{KeySchema, Result, StoreClient};
use parking_lot::RwLock;
use std::collections::HashMap;
use std::sync::Arc;
use tracing::debug;

pub(crate) struct SchemaCache {
    store: Arc<dyn StoreClient>,
    schemas: RwLock<HashMap<String, KeySchema>>,
}

impl SchemaCache {
    pub(crate) fn new(store: Arc<dyn StoreClient>) -> Self {
        Self {
            store,
            schemas: RwLock::new(HashMap::new()),
        }
    }

    pub(crate) fn register(&self, table: &str, schema: KeySchema) {
        self.schemas.write().insert(table.to_string(), schema);
    }

    pub(crate) fn evict(&self, table: &str) {
        self.schemas.write().remove(table);
    }

    #[cfg(test)]
    pub(crate) fn is_cached(&self, table: &str) -> bool {
        self.schemas.read().contains_key(table)
    }
}

impl Catalog for SchemaCache {
    fn key_schema(&self, table: &str) -> Result<KeySchema> {
        if let Some(schema) = self.schemas.read().get(table) {
            return Ok(schema.clone());
        }

        let description = self.store.describe_table(table)?;
        debug!(table, "Cached key schema");
        self.register(table, description.key_schema.clone());
        Ok(description.key_schema)
    }
}
