use async_trait::async_trait;
use redis::AsyncCommands;
use redis::aio::MultiplexedConnection;
use tracing::{debug, info, instrument};

use super::CacheBackend;
use crate::error::SpimexError;

#[derive(Clone)]
pub struct RedisCache {
    connection: MultiplexedConnection,
}

impl RedisCache {
    pub async fn connect(redis_url: &str) -> Result<Self, SpimexError> {
        let client = redis::Client::open(redis_url)?;
        let connection = client.get_multiplexed_async_connection().await?;
        info!("Redis connection established");
        Ok(Self { connection })
    }
}

#[async_trait]
impl CacheBackend for RedisCache {
    #[instrument(skip(self))]
    async fn get(&self, key: &str) -> Result<Option<String>, SpimexError> {
        let mut connection = self.connection.clone();
        let value: Option<String> = connection.get(key).await?;
        debug!(hit = value.is_some(), "Redis GET");
        Ok(value)
    }

    #[instrument(skip(self, value), fields(bytes = value.len()))]
    async fn set_ex(&self, key: &str, value: &str, ttl_secs: u64) -> Result<(), SpimexError> {
        let mut connection = self.connection.clone();
        let _: () = connection.set_ex(key, value, ttl_secs).await?;
        debug!("Redis SETEX");
        Ok(())
    }
}
