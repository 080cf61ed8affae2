//! The hot store: message-id -> originator metadata for DLR correlation,
//! per-user counters, and concatenation-reassembly buffers (§1 Hot Store).
//!
//! Writers use `SETEX`-style semantics (a value plus a TTL in one round
//! trip); readers tolerate missing keys — a late-arriving DLR beyond TTL
//! is logged and dropped rather than treated as an error (§8).

use deadpool_redis::{redis::AsyncCommands, Config, Pool, Runtime};
use jasmin_conf::RedisConfig;
use jasmin_proto::{DlrCorrelation, MessageId, ReassemblyBuffer, UserId};
use tracing::debug;

use crate::error::StoreError;
use crate::keys;

#[derive(Clone)]
pub struct HotStore {
    pool: Pool,
}

impl HotStore {
    pub fn connect(config: &RedisConfig) -> Result<Self, StoreError> {
        let cfg = Config::from_url(config.redis_url());
        let pool = cfg.create_pool(Some(Runtime::Tokio1))?;
        Ok(Self { pool })
    }

    /// Store a DLR correlation under both its parent message-id and (once
    /// known) its SMSC-assigned id (§4.2 step 7: "store correlation in HS
    /// keyed by each segment's eventual SMSC-id ... *and* by parent-id").
    pub async fn put_dlr_correlation(&self, correlation: &DlrCorrelation, ttl_secs: u64) -> Result<(), StoreError> {
        let mut conn = self.pool.get().await?;
        let value = serde_json::to_string(correlation)?;

        conn.set_ex::<_, _, ()>(keys::dlr_by_parent(&correlation.parent_message_id), &value, ttl_secs)
            .await?;
        if let Some(smsc_id) = &correlation.smsc_message_id {
            conn.set_ex::<_, _, ()>(keys::dlr_by_smsc_id(smsc_id), &value, ttl_secs).await?;
        }
        Ok(())
    }

    pub async fn get_dlr_by_parent(&self, msgid: &MessageId) -> Result<Option<DlrCorrelation>, StoreError> {
        self.get_json(&keys::dlr_by_parent(msgid)).await
    }

    pub async fn get_dlr_by_smsc_id(&self, smsc_id: &str) -> Result<Option<DlrCorrelation>, StoreError> {
        match self.get_json(&keys::dlr_by_smsc_id(smsc_id)).await? {
            Some(c) => Ok(Some(c)),
            None => {
                debug!(smsc_id, "no DLR correlation found (expired or never set)");
                Ok(None)
            }
        }
    }

    pub async fn delete_dlr_correlation(&self, correlation: &DlrCorrelation) -> Result<(), StoreError> {
        let mut conn = self.pool.get().await?;
        conn.del::<_, ()>(keys::dlr_by_parent(&correlation.parent_message_id)).await?;
        if let Some(smsc_id) = &correlation.smsc_message_id {
            conn.del::<_, ()>(keys::dlr_by_smsc_id(smsc_id)).await?;
        }
        Ok(())
    }

    /// Fetch-or-create a reassembly buffer, insert `part`, persist it with
    /// a refreshed TTL, and return the concatenated body once complete
    /// (§3 Reassembly Buffer, §4.2 "Long content re-assembly").
    pub async fn insert_reassembly_part(
        &self,
        source_addr: &str,
        destination_addr: &str,
        ref_num: u16,
        total_segments: u8,
        seq_num: u8,
        content: Vec<u8>,
        ttl_secs: u64,
    ) -> Result<Option<Vec<u8>>, StoreError> {
        let key = keys::reassembly(source_addr, destination_addr, ref_num);
        let mut buffer = match self.get_json::<ReassemblyBuffer>(&key).await? {
            Some(existing) => existing,
            None => ReassemblyBuffer::new(source_addr, destination_addr, ref_num, total_segments, chrono::Utc::now()),
        };

        let completed = buffer.insert(seq_num, content);

        if completed.is_some() {
            let mut conn = self.pool.get().await?;
            conn.del::<_, ()>(&key).await?;
        } else {
            let mut conn = self.pool.get().await?;
            let value = serde_json::to_string(&buffer)?;
            conn.set_ex::<_, _, ()>(&key, value, ttl_secs).await?;
        }

        Ok(completed)
    }

    pub async fn increment_submit_sm_count(&self, user_id: &UserId, by: i64) -> Result<i64, StoreError> {
        let mut conn = self.pool.get().await?;
        let value: i64 = conn.incr(keys::counter_submit_sm(user_id), by).await?;
        Ok(value)
    }

    pub async fn increment_deliver_sm_count(&self, user_id: &UserId, by: i64) -> Result<i64, StoreError> {
        let mut conn = self.pool.get().await?;
        let value: i64 = conn.incr(keys::counter_deliver_sm(user_id), by).await?;
        Ok(value)
    }

    async fn get_json<T: serde::de::DeserializeOwned>(&self, key: &str) -> Result<Option<T>, StoreError> {
        let mut conn = self.pool.get().await?;
        let raw: Option<String> = conn.get(key).await?;
        match raw {
            Some(s) => Ok(Some(serde_json::from_str(&s)?)),
            None => Ok(None),
        }
    }
}
