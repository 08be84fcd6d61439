//! # Redis
//!
//! RAM database.
//!
//! Holds the active-account selections: which student record an identity
//! picked when its email matches more than one. One hash key, one field per
//! identity. See the root docs crate for the schema rationale.
//!
//! ## Requirements
//!
//! - Fast lookups, one HGET per login
//! - Tiny dataset, only identities that ever faced the account chooser
//! - Never deleted, stale values are revalidated by the resolver
use std::time::Duration;

use async_trait::async_trait;
use dojo::accounts::SelectionStore;
use dojo::store::StoreError;
use redis::{
    AsyncCommands, Client, RedisError,
    aio::{ConnectionManager, ConnectionManagerConfig},
};

pub const SELECTIONS_KEY: &str = "active_accounts";

pub async fn init_redis(redis_url: &str) -> Result<ConnectionManager, RedisError> {
    let config = ConnectionManagerConfig::new()
        .set_number_of_retries(1)
        .set_connection_timeout(Duration::from_millis(100));

    let client = Client::open(redis_url)?;
    client.get_connection_manager_with_config(config).await
}

/// [`SelectionStore`] over the Redis hash.
pub struct RedisSelections {
    connection: ConnectionManager,
}

impl RedisSelections {
    pub fn new(connection: ConnectionManager) -> Self {
        Self { connection }
    }
}

#[async_trait]
impl SelectionStore for RedisSelections {
    async fn get(&self, identity: &str) -> Result<Option<String>, StoreError> {
        let mut connection = self.connection.clone();
        connection
            .hget(SELECTIONS_KEY, identity)
            .await
            .map_err(|e| StoreError::Read(e.to_string()))
    }

    async fn set(&self, identity: &str, key: &str) -> Result<(), StoreError> {
        let mut connection = self.connection.clone();
        connection
            .hset::<_, _, _, ()>(SELECTIONS_KEY, identity, key)
            .await
            .map_err(|e| StoreError::Write(e.to_string()))
    }
}
