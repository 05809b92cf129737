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

use std::{fmt, net::SocketAddr};

use config::{Config, ConfigBuilder, ConfigError, Environment, File, builder::DefaultState};
use mangrove_sdk::{Credential, SigningError};
use serde::Deserialize;

// Logging configuration constants
/// Default log level (can be overridden by RUST_LOG environment variable)
pub const DEFAULT_LOG_LEVEL: &str = "info";

/// Default log directory component name
pub const LOG_COMPONENT_NAME: &str = "callback";

/// Default console output enabled (can be overridden by LOG_TO_CONSOLE environment variable)
pub const DEFAULT_LOG_TO_CONSOLE: bool = false;

// Server configuration constants
/// Default HTTP server bind address (CALLBACK_BIND_ADDR)
pub const DEFAULT_BIND_ADDR: &str = "0.0.0.0:8888";

/// Default path the service posts order callbacks to (CALLBACK_CALLBACK_PATH)
pub const DEFAULT_CALLBACK_PATH: &str = "/v1.2/order/callback";

/// Default maximum callback body size in bytes (CALLBACK_MAX_BODY_BYTES)
pub const DEFAULT_MAX_BODY_BYTES: usize = 64 * 1024;

// Replay protection constants
/// Accepted clock skew for `x-guarder-signed-at` in seconds (CALLBACK_REPLAY_WINDOW_SECS)
pub const DEFAULT_REPLAY_WINDOW_SECS: u64 = 300;

/// How long a seen nonce is remembered in seconds (CALLBACK_NONCE_TTL_SECS)
pub const DEFAULT_NONCE_TTL_SECS: u64 = 600;

/// Upper bound on remembered nonces (CALLBACK_REPLAY_CACHE_MAX_CAPACITY)
pub const DEFAULT_REPLAY_CACHE_MAX_CAPACITY: u64 = 100_000;

/// Callback receiver configuration
///
/// Loaded from defaults, an optional config file and `CALLBACK_`-prefixed
/// environment variables, in increasing priority. The credential has no
/// default and must be supplied.
#[derive(Clone, Deserialize)]
pub struct ReceiverConfig {
	pub bind_addr: SocketAddr,
	pub workers: Option<usize>,
	pub callback_path: String,
	pub max_body_bytes: usize,
	pub credential_id: String,
	pub credential_secret: String,
	pub replay_window_secs: u64,
	pub nonce_ttl_secs: u64,
	pub replay_cache_max_capacity: u64,
}

impl ReceiverConfig {
	/// Load configuration, reading `path` first when given
	pub fn load(path: Option<&str>) -> Result<Self, ConfigError> {
		dotenv::dotenv().ok();

		let mut builder = Self::builder()?;
		if let Some(path) = path {
			builder = builder.add_source(File::with_name(path));
		}
		builder.add_source(environment()).build()?.try_deserialize()
	}

	/// Builder pre-populated with defaults
	pub fn builder() -> Result<ConfigBuilder<DefaultState>, ConfigError> {
		Config::builder()
			.set_default("bind_addr", DEFAULT_BIND_ADDR)?
			.set_default("callback_path", DEFAULT_CALLBACK_PATH)?
			.set_default("max_body_bytes", DEFAULT_MAX_BODY_BYTES as u64)?
			.set_default("replay_window_secs", DEFAULT_REPLAY_WINDOW_SECS)?
			.set_default("nonce_ttl_secs", DEFAULT_NONCE_TTL_SECS)?
			.set_default("replay_cache_max_capacity", DEFAULT_REPLAY_CACHE_MAX_CAPACITY)
	}

	pub fn credential(&self) -> Result<Credential, SigningError> {
		Credential::new(
			self.credential_id.as_str(),
			self.credential_secret.as_bytes().to_vec(),
		)
	}

	pub fn workers(&self) -> usize {
		self.workers.unwrap_or_else(num_cpus::get)
	}
}

/// `CALLBACK_`-prefixed environment source
///
/// Values stay strings until deserialization so that credentials such as
/// `007` are not rewritten as numbers.
fn environment() -> Environment {
	Environment::with_prefix("CALLBACK")
}

impl fmt::Debug for ReceiverConfig {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		f.debug_struct("ReceiverConfig")
			.field("bind_addr", &self.bind_addr)
			.field("workers", &self.workers)
			.field("callback_path", &self.callback_path)
			.field("max_body_bytes", &self.max_body_bytes)
			.field("credential_id", &self.credential_id)
			.field("credential_secret", &"<redacted>")
			.field("replay_window_secs", &self.replay_window_secs)
			.field("nonce_ttl_secs", &self.nonce_ttl_secs)
			.field("replay_cache_max_capacity", &self.replay_cache_max_capacity)
			.finish()
	}
}

#[cfg(test)]
mod tests {
	use super::*;

	fn with_credential() -> ConfigBuilder<DefaultState> {
		ReceiverConfig::builder()
			.unwrap()
			.set_override("credential_id", "sbSO9eCvjQkE38hVnrVy4TiD")
			.unwrap()
			.set_override("credential_secret", "ER3wT3UP05TVEyh8CdMnZsCz5I1j0z")
			.unwrap()
	}

	#[test]
	fn test_defaults() {
		let config: ReceiverConfig = with_credential().build().unwrap().try_deserialize().unwrap();

		assert_eq!(config.bind_addr, DEFAULT_BIND_ADDR.parse().unwrap());
		assert_eq!(config.callback_path, DEFAULT_CALLBACK_PATH);
		assert_eq!(config.max_body_bytes, DEFAULT_MAX_BODY_BYTES);
		assert_eq!(config.replay_window_secs, DEFAULT_REPLAY_WINDOW_SECS);
		assert!(config.workers.is_none());
		assert!(config.workers() >= 1);
		assert_eq!(config.credential().unwrap().identity(), "sbSO9eCvjQkE38hVnrVy4TiD");
	}

	#[test]
	fn test_credential_required() {
		let result = ReceiverConfig::builder()
			.unwrap()
			.build()
			.unwrap()
			.try_deserialize::<ReceiverConfig>();
		assert!(result.is_err());
	}

	#[test]
	fn test_empty_secret_rejected() {
		let config: ReceiverConfig = with_credential()
			.set_override("credential_secret", "")
			.unwrap()
			.build()
			.unwrap()
			.try_deserialize()
			.unwrap();
		assert!(matches!(config.credential(), Err(SigningError::Configuration(_))));
	}

	#[test]
	fn test_environment_credentials_kept_verbatim() {
		let mut vars = config::Map::new();
		vars.insert("CALLBACK_CREDENTIAL_ID".to_string(), "007".to_string());
		vars.insert("CALLBACK_CREDENTIAL_SECRET".to_string(), "1e5".to_string());
		vars.insert("CALLBACK_WORKERS".to_string(), "2".to_string());
		vars.insert("CALLBACK_MAX_BODY_BYTES".to_string(), "1024".to_string());
		vars.insert("CALLBACK_BIND_ADDR".to_string(), "127.0.0.1:9000".to_string());

		let config: ReceiverConfig = ReceiverConfig::builder()
			.unwrap()
			.add_source(environment().source(Some(vars)))
			.build()
			.unwrap()
			.try_deserialize()
			.unwrap();

		assert_eq!(config.credential_id, "007");
		assert_eq!(config.credential_secret, "1e5");
		assert_eq!(config.workers, Some(2));
		assert_eq!(config.max_body_bytes, 1024);
		assert_eq!(config.bind_addr, "127.0.0.1:9000".parse().unwrap());
	}

	#[test]
	fn test_debug_redacts_secret() {
		let config: ReceiverConfig = with_credential().build().unwrap().try_deserialize().unwrap();
		let rendered = format!("{:?}", config);
		assert!(!rendered.contains("ER3wT3UP05TVEyh8CdMnZsCz5I1j0z"));
	}
}
