// Copyright 2025 itscheems
//
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//
//     http://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS,
// WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
// See the License for the specific language governing permissions and
// limitations under the License.

//! Best-effort replay protection for verified callbacks
//!
//! A callback is accepted once per `(x-guarder-id, x-guarder-uuid)` pair, and
//! only while its `x-guarder-signed-at` lies within the configured window
//! around the local clock. Runs after signature verification so that forged
//! requests cannot fill the nonce cache.
//!
//! The cache is per process and bounded; it does not provide uniqueness
//! across multiple receiver instances.

use std::{
	sync::atomic::{AtomicU64, Ordering},
	time::Duration,
};

use mangrove_sdk::SigningHeaders;
use moka::sync::Cache;
use thiserror::Error;

use crate::config::ReceiverConfig;

#[derive(Debug, Error)]
pub enum ReplayError {
	#[error("Invalid timestamp: {0}")]
	InvalidTimestamp(String),
	#[error("Timestamp outside allowed window")]
	TimestampOutsideWindow,
	#[error("Replay detected")]
	ReplayDetected,
}

pub struct ReplayGuard {
	/// Value is a per-insert token used to detect whether this call created the entry.
	cache: Cache<(String, String), u64>,
	window_ms: u64,
	next_token: AtomicU64,
}

impl ReplayGuard {
	pub fn new(replay_window_secs: u64, nonce_ttl_secs: u64, max_capacity: u64) -> Self {
		let cache = Cache::builder()
			.max_capacity(max_capacity)
			.time_to_live(Duration::from_secs(nonce_ttl_secs))
			.build();

		Self {
			cache,
			window_ms: replay_window_secs.saturating_mul(1_000),
			next_token: AtomicU64::new(1),
		}
	}

	pub fn from_config(config: &ReceiverConfig) -> Self {
		Self::new(
			config.replay_window_secs,
			config.nonce_ttl_secs,
			config.replay_cache_max_capacity,
		)
	}

	/// Check the timestamp window, then record the nonce.
	///
	/// `now_ms` is the local clock in epoch milliseconds.
	pub fn check(&self, headers: &SigningHeaders, now_ms: i64) -> Result<(), ReplayError> {
		let signed_at: i64 = headers
			.signed_at
			.parse()
			.map_err(|e| ReplayError::InvalidTimestamp(format!("{}: {}", headers.signed_at, e)))?;

		if signed_at.abs_diff(now_ms) > self.window_ms {
			return Err(ReplayError::TimestampOutsideWindow);
		}

		self.check_and_insert(&headers.guarder_id, &headers.nonce)
	}

	/// Insert the pair unless it is already present.
	///
	/// `get_with` inserts our token at most once per key; getting back a
	/// different token means another call got there first.
	fn check_and_insert(&self, identity: &str, nonce: &str) -> Result<(), ReplayError> {
		let key = (identity.to_string(), nonce.to_string());
		let token = self.next_token.fetch_add(1, Ordering::Relaxed);

		let stored = self.cache.get_with(key, || token);
		if stored != token {
			return Err(ReplayError::ReplayDetected);
		}

		Ok(())
	}
}
