//! Typed access to the speed settings kept in the extension store.
//!
//! Layout (shared with every extension context):
//! - `channels`: object mapping channel display name to a speed, stored as a
//!   string (`"1.5"`) or a number
//! - `defaultSpeed`: a single speed, `"1"` when never written

use std::sync::Arc;

use paceline_contracts::store::{SettingsStore, StoreEntries, StoreError};
use paceline_model::{ChannelName, Speed, SpeedOverrides, SpeedPolicy, SpeedValue};
use serde_json::{Map, Value};
use tracing::warn;

pub mod file;
pub mod memory;

pub use file::JsonFileStore;
pub use memory::MemoryStore;

pub const CHANNELS_KEY: &str = "channels";
pub const DEFAULT_SPEED_KEY: &str = "defaultSpeed";

/// Speed override mapping and default speed on top of a [`SettingsStore`].
pub struct SpeedPolicyStore<S> {
    store: Arc<S>,
}

impl<S> Clone for SpeedPolicyStore<S> {
    fn clone(&self) -> Self {
        Self {
            store: Arc::clone(&self.store),
        }
    }
}

impl<S> std::fmt::Debug for SpeedPolicyStore<S> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SpeedPolicyStore")
            .field("store_type", &std::any::type_name::<S>())
            .finish()
    }
}

impl<S: SettingsStore> SpeedPolicyStore<S> {
    pub fn new(store: Arc<S>) -> Self {
        Self { store }
    }

    pub fn store(&self) -> &Arc<S> {
        &self.store
    }

    pub async fn overrides(&self) -> Result<SpeedOverrides, StoreError> {
        let entries = self.store.get(&[CHANNELS_KEY]).await?;
        Ok(decode_overrides(entries.get(CHANNELS_KEY)))
    }

    pub async fn default_speed(&self) -> Result<Speed, StoreError> {
        let entries = self.store.get(&[DEFAULT_SPEED_KEY]).await?;
        Ok(decode_default(entries.get(DEFAULT_SPEED_KEY)))
    }

    /// Overrides and default in a single round trip.
    pub async fn snapshot(&self) -> Result<SpeedPolicy, StoreError> {
        let entries = self.store.get(&[CHANNELS_KEY, DEFAULT_SPEED_KEY]).await?;
        let overrides = decode_overrides(entries.get(CHANNELS_KEY));
        let default_speed = decode_default(entries.get(DEFAULT_SPEED_KEY));
        Ok(SpeedPolicy::new(overrides, default_speed))
    }

    pub async fn set_override(
        &self,
        channel: &ChannelName,
        speed: Speed,
    ) -> Result<(), StoreError> {
        let mut channels = self.raw_channels().await?;
        channels.insert(channel.as_str().to_string(), encode_speed(speed)?);
        self.write_channels(channels).await
    }

    /// Returns whether an override existed.
    pub async fn delete_override(&self, channel: &str) -> Result<bool, StoreError> {
        let mut channels = self.raw_channels().await?;
        let existed = channels.remove(channel).is_some();
        self.write_channels(channels).await?;
        Ok(existed)
    }

    pub async fn set_default(&self, speed: Speed) -> Result<(), StoreError> {
        let mut entries = StoreEntries::new();
        entries.insert(DEFAULT_SPEED_KEY.to_string(), encode_speed(speed)?);
        self.store.set(entries).await
    }

    // Read-modify-write keeps entries this version cannot decode. A
    // `channels` value that is not an object is replaced on the next write.
    async fn raw_channels(&self) -> Result<Map<String, Value>, StoreError> {
        let mut entries = self.store.get(&[CHANNELS_KEY]).await?;
        Ok(match entries.remove(CHANNELS_KEY) {
            Some(Value::Object(map)) => map,
            None | Some(Value::Null) => Map::new(),
            Some(other) => {
                warn!(value = %other, "Replacing stored channels that are not an object");
                Map::new()
            }
        })
    }

    async fn write_channels(&self, channels: Map<String, Value>) -> Result<(), StoreError> {
        let mut entries = StoreEntries::new();
        entries.insert(CHANNELS_KEY.to_string(), Value::Object(channels));
        self.store.set(entries).await
    }
}

fn encode_speed(speed: Speed) -> Result<Value, StoreError> {
    Ok(serde_json::to_value(SpeedValue::from(speed))?)
}

fn decode_overrides(raw: Option<&Value>) -> SpeedOverrides {
    let map = match raw {
        Some(Value::Object(map)) => map,
        None | Some(Value::Null) => return SpeedOverrides::new(),
        Some(other) => {
            warn!(value = %other, "Stored channels are not an object, reading no overrides");
            return SpeedOverrides::new();
        }
    };

    let mut overrides = SpeedOverrides::new();
    for (channel, value) in map {
        match decode_speed(value) {
            Some(speed) => {
                overrides.insert(ChannelName::new(channel.as_str()), speed);
            }
            None => {
                warn!(channel = %channel, value = %value, "Ignoring unreadable channel speed");
            }
        }
    }
    overrides
}

fn decode_default(raw: Option<&Value>) -> Speed {
    match raw {
        None | Some(Value::Null) => Speed::NORMAL,
        Some(value) => decode_speed(value).unwrap_or_else(|| {
            warn!(value = %value, "Ignoring unreadable default speed");
            Speed::NORMAL
        }),
    }
}

fn decode_speed(value: &Value) -> Option<Speed> {
    serde_json::from_value::<SpeedValue>(value.clone())
        .ok()
        .and_then(|raw| raw.to_speed().ok())
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn policy_over(store: MemoryStore) -> SpeedPolicyStore<MemoryStore> {
        SpeedPolicyStore::new(Arc::new(store))
    }

    #[tokio::test]
    async fn empty_store_means_normal_speed() {
        let policy = policy_over(MemoryStore::new());
        let snapshot = policy.snapshot().await.unwrap();
        assert!(snapshot.overrides.is_empty());
        assert_eq!(snapshot.default_speed, Speed::NORMAL);
    }

    #[tokio::test]
    async fn reads_string_and_number_speeds() {
        let policy = policy_over(MemoryStore::with_entries(json!({
            "channels": {"Acme": "1.5", "Numbers": 0.75, "Broken": "fast"},
            "defaultSpeed": "1.25",
        })));

        let snapshot = policy.snapshot().await.unwrap();
        assert_eq!(snapshot.overrides.get("Acme"), Some(Speed::new(1.5)));
        assert_eq!(snapshot.overrides.get("Numbers"), Some(Speed::new(0.75)));
        assert_eq!(snapshot.overrides.get("Broken"), None);
        assert_eq!(snapshot.default_speed, Speed::new(1.25));
    }

    #[tokio::test]
    async fn writes_keep_the_stored_layout() {
        let store = Arc::new(MemoryStore::with_entries(json!({
            "channels": {"Legacy": "not-a-number"},
        })));
        let policy = SpeedPolicyStore::new(Arc::clone(&store));

        policy
            .set_override(&ChannelName::new("Acme"), Speed::new(0.5))
            .await
            .unwrap();
        policy.set_default(Speed::new(2.0)).await.unwrap();

        assert_eq!(
            store.dump().await,
            json!({
                "channels": {"Legacy": "not-a-number", "Acme": "0.5"},
                "defaultSpeed": "2",
            })
        );
    }

    #[tokio::test]
    async fn delete_reports_whether_override_existed() {
        let policy = policy_over(MemoryStore::with_entries(json!({
            "channels": {"Acme": "1.5"},
        })));
        assert!(policy.delete_override("Acme").await.unwrap());
        assert!(!policy.delete_override("Acme").await.unwrap());
        assert!(policy.overrides().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn non_object_channels_keeps_the_stored_default() {
        let policy = policy_over(MemoryStore::with_entries(json!({
            "channels": ["legacy"],
            "defaultSpeed": "1.5",
        })));

        let snapshot = policy.snapshot().await.unwrap();
        assert!(snapshot.overrides.is_empty());
        assert_eq!(snapshot.default_speed, Speed::new(1.5));
        assert!(policy.overrides().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn writes_replace_non_object_channels() {
        let store = Arc::new(MemoryStore::with_entries(json!({
            "channels": "legacy",
            "defaultSpeed": "1.5",
        })));
        let policy = SpeedPolicyStore::new(Arc::clone(&store));

        policy
            .set_override(&ChannelName::new("Acme"), Speed::new(0.5))
            .await
            .unwrap();
        assert_eq!(
            store.dump().await,
            json!({"channels": {"Acme": "0.5"}, "defaultSpeed": "1.5"})
        );

        store
            .set(json!({"channels": 7}).as_object().cloned().unwrap())
            .await
            .unwrap();
        assert!(!policy.delete_override("Acme").await.unwrap());
        assert_eq!(store.dump().await["channels"], json!({}));
    }
}
