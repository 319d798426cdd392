use anyhow::Result;
use bytes::Bytes;
use redis::{AsyncCommands, Client};
use tracing::warn;

#[derive(Clone)]
pub struct RedisCache {
    client: Client,
}

impl RedisCache {
    pub async fn connect(redis_url: &str) -> Result<Self> {
        let client = Client::open(redis_url)?;
        let mut conn = client.get_multiplexed_async_connection().await?;
        redis::cmd("PING").query_async::<_, String>(&mut conn).await?;
        Ok(Self { client })
    }

    pub fn client(&self) -> &Client {
        &self.client
    }

    pub async fn ping(&self) -> Result<()> {
        let mut conn = self.client.get_multiplexed_async_connection().await?;
        redis::cmd("PING").query_async::<_, String>(&mut conn).await?;
        Ok(())
    }
}

const PAGE_KEY_PREFIX: &str = "page:";

/// Whole-response cache for listing routes.
///
/// Entries are keyed by route (path and query string) only, so anything
/// stored here must be identical for every viewer. Entries expire after
/// `ttl_seconds`; nothing invalidates them early except [`PageCache::clear`].
/// A TTL of zero disables the cache.
#[derive(Clone)]
pub struct PageCache {
    redis: RedisCache,
    ttl_seconds: u64,
}

impl PageCache {
    pub fn new(redis: RedisCache, ttl_seconds: u64) -> Self {
        Self { redis, ttl_seconds }
    }

    pub fn is_enabled(&self) -> bool {
        self.ttl_seconds > 0
    }

    /// Cached body for `route`, if present. Redis errors are treated as a miss.
    pub async fn get(&self, route: &str) -> Option<Bytes> {
        if !self.is_enabled() {
            return None;
        }

        let mut conn = match self.redis.client().get_multiplexed_async_connection().await {
            Ok(conn) => conn,
            Err(err) => {
                warn!(error = ?err, route, "page cache unavailable");
                return None;
            }
        };

        match conn.get::<_, Option<Vec<u8>>>(page_key(route)).await {
            Ok(body) => body.map(Bytes::from),
            Err(err) => {
                warn!(error = ?err, route, "failed to read page cache");
                None
            }
        }
    }

    pub async fn put(&self, route: &str, body: &[u8]) {
        if !self.is_enabled() {
            return;
        }

        let mut conn = match self.redis.client().get_multiplexed_async_connection().await {
            Ok(conn) => conn,
            Err(err) => {
                warn!(error = ?err, route, "page cache unavailable");
                return;
            }
        };

        if let Err(err) = conn
            .set_ex::<_, _, ()>(page_key(route), body, self.ttl_seconds)
            .await
        {
            warn!(error = ?err, route, "failed to write page cache");
        }
    }

    /// Drops every cached page.
    pub async fn clear(&self) -> Result<u64> {
        let mut conn = self.redis.client().get_multiplexed_async_connection().await?;

        let keys: Vec<String> = {
            let mut iter = conn
                .scan_match::<_, String>(format!("{}*", PAGE_KEY_PREFIX))
                .await?;
            let mut keys = Vec::new();
            while let Some(key) = iter.next_item().await {
                keys.push(key);
            }
            keys
        };

        if keys.is_empty() {
            return Ok(0);
        }

        let removed: u64 = conn.del(&keys).await?;
        Ok(removed)
    }
}

fn page_key(route: &str) -> String {
    format!("{}{}", PAGE_KEY_PREFIX, route)
}
