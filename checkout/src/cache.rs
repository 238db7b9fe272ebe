// gok_checkout/src/cache.rs

//! Cache-aside helper with a per-entry time to live.

use parking_lot::RwLock;
use std::any::Any;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::{Duration, Instant};

struct Entry {
  value: Arc<dyn Any + Send + Sync>,
  expires_at: Instant,
}

/// Keyed values of any `Clone` type. A miss is always safe: callers reload from the store.
pub struct Cache {
  entries: RwLock<HashMap<String, Entry>>,
  default_ttl: Duration,
}

impl Cache {
  pub fn new(default_ttl: Duration) -> Self {
    Self {
      entries: RwLock::new(HashMap::new()),
      default_ttl,
    }
  }

  pub fn get<T: Clone + Send + Sync + 'static>(&self, key: &str) -> Option<T> {
    let entries = self.entries.read();
    let entry = entries.get(key)?;
    if entry.expires_at <= Instant::now() {
      return None;
    }
    entry.value.downcast_ref::<T>().cloned()
  }

  pub fn set<T: Send + Sync + 'static>(&self, key: &str, value: T) {
    self.set_with_ttl(key, value, self.default_ttl);
  }

  pub fn set_with_ttl<T: Send + Sync + 'static>(&self, key: &str, value: T, ttl: Duration) {
    if ttl.is_zero() {
      return;
    }
    let mut entries = self.entries.write();
    entries.retain(|_, entry| entry.expires_at > Instant::now());
    entries.insert(
      key.to_string(),
      Entry {
        value: Arc::new(value),
        expires_at: Instant::now() + ttl,
      },
    );
  }

  pub fn remove(&self, key: &str) {
    self.entries.write().remove(key);
  }

  pub fn clear(&self) {
    self.entries.write().clear();
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn set_get_remove() {
    let cache = Cache::new(Duration::from_secs(60));
    cache.set("banks", vec!["VCB".to_string()]);
    assert_eq!(cache.get::<Vec<String>>("banks"), Some(vec!["VCB".to_string()]));
    assert_eq!(cache.get::<u32>("banks"), None, "wrong type is a miss");
    cache.remove("banks");
    assert_eq!(cache.get::<Vec<String>>("banks"), None);
  }

  #[test]
  fn expired_entries_miss() {
    let cache = Cache::new(Duration::from_secs(60));
    cache.set_with_ttl("short", 7u32, Duration::from_millis(1));
    std::thread::sleep(Duration::from_millis(5));
    assert_eq!(cache.get::<u32>("short"), None);
  }

  #[test]
  fn zero_ttl_disables_caching() {
    let cache = Cache::new(Duration::ZERO);
    cache.set("k", 1u8);
    assert_eq!(cache.get::<u8>("k"), None);
    cache.clear();
  }
}
