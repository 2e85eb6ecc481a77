use crate::utils::time_utils::current_timestamp;

/**
 * Counts how many times the sensitive endpoints (login,
 * contact) are called per window of max_requests_time
 * seconds, and blocks them entirely for block_duration
 * seconds once max_requests is reached.
 * It's global, not per client IP.
 */
pub struct BasicRateLimiter {
  counter: u32,
  last_update: i64,
  is_limited: bool,
  max_requests: u32,
  max_requests_time: u32,
  block_duration: u32
}

impl BasicRateLimiter {

  pub fn new(
    max_requests: u32,
    max_requests_time: u32,
    block_duration: u32
  ) -> Self {
    Self {
      counter: 0,
      last_update: current_timestamp(),
      is_limited: false,
      max_requests,
      max_requests_time,
      block_duration
    }
  }

  pub fn is_locked(&self) -> bool {
    self.is_limited
  }

  pub fn is_expired(&self) -> bool {
    self.is_expired_at(current_timestamp())
  }

  // If currently locked, check if past block_duration.
  // Check if past max_requests_time otherwise.
  fn is_expired_at(&self, now: i64) -> bool {
    let window = if self.is_locked() {
      self.block_duration
    } else {
      self.max_requests_time
    };
    now - self.last_update >= i64::from(window)
  }

  // Counts one request, returns true if that request has
  // to be refused.
  pub fn update(&mut self) -> bool {
    self.update_at(current_timestamp())
  }

  fn update_at(&mut self, now: i64) -> bool {
    if self.is_expired_at(now) {
      // Reset, this request is the first of a new window:
      self.counter = 1;
      self.last_update = now;
      self.is_limited = false;
    } else if !self.is_limited {
      self.counter += 1;
      if self.counter > self.max_requests {
        self.is_limited = true;
        // The block starts now:
        self.last_update = now;
      }
    }
    self.is_limited
  }

}
