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

//! Order Callback Receiver
//!
//! Accepts the order status callbacks the order service posts back to a
//! merchant. Every callback is checked against the shared credential with
//! the same HMAC-SHA512 scheme used for outbound requests, then against a
//! timestamp window and a nonce cache before the order is processed.
//!
//! Configuration comes from `CALLBACK_`-prefixed environment variables,
//! optionally layered over the file named by `CALLBACK_CONFIG`.

mod config;
mod handlers;
mod logging;
mod middleware;
mod replay;
mod routes;
mod server;

use anyhow::{Context, Result};
use tracing::info;

use crate::{config::ReceiverConfig, logging::init_logging, server::CallbackServer};

#[actix_rt::main]
async fn main() -> Result<()> {
	// Initialize logging first
	init_logging()?;

	let config_path = std::env::var("CALLBACK_CONFIG").ok();
	let config = ReceiverConfig::load(config_path.as_deref())
		.context("Failed to load callback receiver configuration")?;
	info!(target: "server", "Starting Mangrove callback receiver: {:?}", config);

	let server = CallbackServer::new(config).context("Failed to create callback server")?;

	server.serve().await.context("Failed to start callback server")?;

	Ok(())
}
