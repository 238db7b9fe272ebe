// gok_checkout/src/clock.rs

use chrono::{DateTime, Duration, Utc};
use parking_lot::Mutex;

/// Source of "now" for expiry windows, coupon date checks and order numbers.
pub trait Clock: Send + Sync {
  fn now(&self) -> DateTime<Utc>;
}

#[derive(Debug, Default, Clone, Copy)]
pub struct SystemClock;

impl Clock for SystemClock {
  fn now(&self) -> DateTime<Utc> {
    Utc::now()
  }
}

/// A clock that only moves when told to.
#[derive(Debug)]
pub struct ManualClock {
  current: Mutex<DateTime<Utc>>,
}

impl ManualClock {
  pub fn new(start: DateTime<Utc>) -> Self {
    Self {
      current: Mutex::new(start),
    }
  }

  pub fn set(&self, at: DateTime<Utc>) {
    *self.current.lock() = at;
  }

  pub fn advance(&self, by: Duration) {
    let mut current = self.current.lock();
    *current += by;
  }
}

impl Clock for ManualClock {
  fn now(&self) -> DateTime<Utc> {
    *self.current.lock()
  }
}
