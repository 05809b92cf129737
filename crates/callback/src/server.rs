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

use actix_web::{App, HttpServer, web};
use anyhow::{Context, Result};
use mangrove_sdk::{CallbackVerifier, Credential};
use tracing::info;

use crate::{
	config::ReceiverConfig, middleware::LoggingMiddleware, replay::ReplayGuard,
	routes::configure_routes,
};

/// Shared state for callback handlers
pub struct CallbackState {
	pub verifier: CallbackVerifier,
	pub replay_guard: ReplayGuard,
}

impl CallbackState {
	pub fn new(credential: Credential, replay_guard: ReplayGuard) -> Self {
		Self {
			verifier: CallbackVerifier::new(credential),
			replay_guard,
		}
	}
}

/// Callback receiver server
pub struct CallbackServer {
	config: ReceiverConfig,
	state: web::Data<CallbackState>,
}

impl CallbackServer {
	/// Create a new callback server
	pub fn new(config: ReceiverConfig) -> Result<Self> {
		let credential = config
			.credential()
			.context("Invalid callback credential")?;
		let state = web::Data::new(CallbackState::new(
			credential,
			ReplayGuard::from_config(&config),
		));

		Ok(Self { config, state })
	}

	/// Start the HTTP server and run until shutdown
	pub async fn serve(self) -> Result<()> {
		let Self { config, state } = self;
		let callback_path = config.callback_path.clone();
		let max_body_bytes = config.max_body_bytes;

		info!(
			target: "server",
			"Listening on {} for callbacks at {} with {} workers",
			config.bind_addr,
			callback_path,
			config.workers()
		);

		HttpServer::new(move || {
			let path = callback_path.clone();
			App::new()
				.app_data(state.clone())
				.app_data(web::PayloadConfig::new(max_body_bytes))
				.wrap(LoggingMiddleware)
				.configure(move |cfg| configure_routes(cfg, &path))
		})
		.workers(config.workers())
		.bind(config.bind_addr)
		.with_context(|| format!("Failed to bind {}", config.bind_addr))?
		.run()
		.await
		.context("Callback server terminated with an error")
	}
}
