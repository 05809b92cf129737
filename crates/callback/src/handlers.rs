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

use actix_web::{HttpRequest, HttpResponse, Responder, http::StatusCode, web};
use mangrove_sdk::{CallbackRequest, Order, VerificationError};
use serde_json::Value;
use thiserror::Error;
use tracing::{info, warn};

use crate::{
	replay::ReplayError,
	server::CallbackState,
};

/// Error types for callback handling
#[derive(Debug, Error)]
pub enum CallbackError {
	#[error("Verification error: {0}")]
	Verification(#[from] VerificationError),
	#[error("Replay error: {0}")]
	Replay(#[from] ReplayError),
	#[error("Invalid body: {0}")]
	InvalidBody(String),
}

impl actix_web::ResponseError for CallbackError {
	fn status_code(&self) -> StatusCode {
		match self {
			CallbackError::Verification(_) => StatusCode::UNAUTHORIZED,
			CallbackError::Replay(_) => StatusCode::CONFLICT,
			CallbackError::InvalidBody(_) => StatusCode::BAD_REQUEST,
		}
	}

	fn error_response(&self) -> HttpResponse {
		HttpResponse::build(self.status_code()).json(serde_json::json!({
			"code": self.status_code().as_u16(),
			"message": self.to_string()
		}))
	}
}

/// Health check endpoint
pub async fn health() -> impl Responder {
	HttpResponse::Ok().json(serde_json::json!({
		"status": "ok",
		"service": "mangrove-callback"
	}))
}

/// Convert the raw HTTP request into the form the verifier expects.
///
/// The path keeps its query string untouched. Header values that are not
/// visible ASCII are dropped; a dropped signed header fails verification.
fn to_callback_request(req: &HttpRequest, body: &[u8]) -> Result<CallbackRequest, CallbackError> {
	let path = req
		.uri()
		.path_and_query()
		.map(|pq| pq.as_str())
		.unwrap_or_else(|| req.path());

	let mut callback = CallbackRequest::new(req.method().as_str(), path);
	for (name, value) in req.headers() {
		if let Ok(value) = value.to_str() {
			callback.headers.insert(name.as_str().to_string(), value.to_string());
		}
	}

	if !body.is_empty() {
		let value: Value = serde_json::from_slice(body)
			.map_err(|e| CallbackError::InvalidBody(format!("Malformed JSON: {}", e)))?;
		callback.body = Some(value);
	}

	Ok(callback)
}

/// Handle an order status callback
///
/// The body is trusted only after the signature has been verified and the
/// nonce has passed the replay guard.
pub async fn order_callback(
	state: web::Data<CallbackState>,
	req: HttpRequest,
	body: web::Bytes,
) -> Result<HttpResponse, CallbackError> {
	let callback = to_callback_request(&req, &body)?;

	let verified = state.verifier.verify(&callback)?;
	state
		.replay_guard
		.check(verified.headers(), chrono::Utc::now().timestamp_millis())
		.inspect_err(|e| {
			warn!(
				target: "callback",
				nonce = %verified.headers().nonce,
				error = %e,
				"Callback rejected by replay guard"
			)
		})?;

	let order: Order = verified
		.parse()
		.map_err(|e| CallbackError::InvalidBody(format!("Not an order: {}", e)))?;

	info!(
		target: "callback",
		code = order.code.as_deref().unwrap_or(""),
		status = order.status.as_deref().unwrap_or(""),
		nonce = %verified.headers().nonce,
		"Order callback accepted"
	);

	Ok(HttpResponse::Ok().json(serde_json::json!({
		"code": 0,
		"message": "ok"
	})))
}
