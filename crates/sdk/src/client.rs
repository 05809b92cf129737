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

use std::collections::BTreeMap;
use std::time::Duration;

use reqwest::{Client as ReqwestClient, Method, StatusCode, Url};
use serde::de::DeserializeOwned;
use serde_json::Value;
use thiserror::Error;
use tracing::debug;

use crate::canonical;
use crate::signing::{Credential, RequestSigner, SigningError};
use crate::types::{ApiResponse, MerchantOrder, Order, UserOrder};
use crate::verify::{CallbackRequest, CallbackVerifier, VerificationError};

/// Default request timeout
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(30);

/// Error types for client operations
#[derive(Debug, Error)]
pub enum ClientError {
	#[error("Network error: {0}")]
	Network(String),
	#[error("Serialization error: {0}")]
	Serialization(String),
	#[error("Server error {status}: {message}")]
	Server { status: u16, message: String },
	#[error("Signing error: {0}")]
	Signing(#[from] SigningError),
	#[error("Verification error: {0}")]
	Verification(#[from] VerificationError),
	#[error("Invalid request: {0}")]
	InvalidRequest(String),
	#[error("Runtime error: {0}")]
	Runtime(String),
}

/// Immutable client configuration
#[derive(Debug, Clone)]
pub struct ClientConfig {
	/// Service endpoint, e.g. `http://10.0.0.254:4003`
	pub endpoint: String,
	pub credential: Credential,
	pub timeout: Duration,
}

impl ClientConfig {
	pub fn new(endpoint: impl Into<String>, credential: Credential) -> Self {
		Self {
			endpoint: endpoint.into(),
			credential,
			timeout: DEFAULT_TIMEOUT,
		}
	}

	pub fn with_timeout(mut self, timeout: Duration) -> Self {
		self.timeout = timeout;
		self
	}
}

/// Derive the signed `host` header (`host[:port]`) from an endpoint URL.
///
/// The authority is normalized by URL parsing: the host is lowercased and a
/// port equal to the scheme default is dropped, so
/// `http://API.example.com:80` yields `api.example.com`. The header is set
/// explicitly from this value, so what is sent always matches what is signed.
pub fn endpoint_host(endpoint: &str) -> Result<String, SigningError> {
	let url = Url::parse(endpoint)
		.map_err(|e| SigningError::Configuration(format!("Invalid endpoint {}: {}", endpoint, e)))?;
	let host = url.host_str().ok_or_else(|| {
		SigningError::Configuration(format!("Endpoint has no host: {}", endpoint))
	})?;

	Ok(match url.port() {
		Some(port) => format!("{}:{}", host, port),
		None => host.to_string(),
	})
}

/// Client for the order/payment service
///
/// Every request is signed with the configured credential. Inbound order
/// callbacks are verified with the same credential.
pub struct Client {
	base_url: String,
	client: ReqwestClient,
	signer: RequestSigner,
	verifier: CallbackVerifier,
}

impl Client {
	/// Create a new client from an explicit configuration
	pub fn new(config: ClientConfig) -> Result<Self, ClientError> {
		let host = endpoint_host(&config.endpoint)?;
		let signer = RequestSigner::new(config.credential.clone(), host)?;
		let verifier = CallbackVerifier::new(config.credential);

		let client = ReqwestClient::builder()
			.timeout(config.timeout)
			.build()
			.map_err(|e| ClientError::Network(format!("Failed to create HTTP client: {}", e)))?;

		Ok(Self {
			base_url: config.endpoint.trim_end_matches('/').to_string(),
			client,
			signer,
			verifier,
		})
	}

	pub fn signer(&self) -> &RequestSigner {
		&self.signer
	}

	pub fn verifier(&self) -> &CallbackVerifier {
		&self.verifier
	}

	/// Build a signed request without sending it
	///
	/// The body is the canonical encoding of `payload`, i.e. exactly the bytes
	/// covered by the signature. No body is attached when `payload` is `None`.
	pub fn build_request(
		&self,
		method: Method,
		path: &str,
		payload: Option<&Value>,
	) -> Result<reqwest::Request, ClientError> {
		let signed = self.signer.build_headers(method.as_str(), path, payload)?;
		let url = format!("{}{}", self.base_url, path);

		let mut builder = self.client.request(method, &url);
		for (name, value) in signed.pairs() {
			builder = builder.header(name, value);
		}
		if payload.is_some() {
			builder = builder.body(canonical::encode(payload));
		}

		builder
			.build()
			.map_err(|e| ClientError::InvalidRequest(format!("{}: {}", url, e)))
	}

	/// Send a signed request and unwrap the `data` field of the response
	///
	/// Only HTTP 200 counts as success. Nothing is retried.
	pub async fn request<T: DeserializeOwned>(
		&self,
		method: Method,
		path: &str,
		payload: Option<&Value>,
	) -> Result<Option<T>, ClientError> {
		let request = self.build_request(method.clone(), path, payload)?;

		let response = self
			.client
			.execute(request)
			.await
			.map_err(|e| ClientError::Network(format!("Request failed: {}", e)))?;

		let status = response.status();
		debug!(method = %method, path = %path, status = status.as_u16(), "Received response");

		if status != StatusCode::OK {
			let error_text = response
				.text()
				.await
				.unwrap_or_else(|_| format!("HTTP {}", status));
			let message = serde_json::from_str::<ApiResponse<Value>>(&error_text)
				.ok()
				.and_then(|envelope| envelope.message)
				.unwrap_or(error_text);
			return Err(ClientError::Server {
				status: status.as_u16(),
				message,
			});
		}

		let envelope: ApiResponse<T> = response
			.json()
			.await
			.map_err(|e| ClientError::Serialization(format!("Failed to parse response: {}", e)))?;

		Ok(envelope.data)
	}

	/// Create a merchant order
	///
	/// A callback endpoint, when set, is registered with the `v2:` prefix so
	/// the service signs its callbacks with the current scheme.
	pub async fn create_merchant_order(
		&self,
		mut merchant_order: MerchantOrder,
	) -> Result<Vec<MerchantOrder>, ClientError> {
		if let Some(endpoint) = merchant_order.order.order_callback.endpoint.as_mut()
			&& !endpoint.is_empty()
		{
			*endpoint = format!("v2:{}", endpoint);
		}

		let payload = canonical::to_value(&merchant_order)?;
		let result: Option<Vec<MerchantOrder>> = self
			.request(Method::PUT, "/v1.2/merchant-order", Some(&payload))
			.await?;
		Ok(result.unwrap_or_default())
	}

	/// Get an order by UUID
	pub async fn describe_order(&self, uuid: &str) -> Result<Option<Order>, ClientError> {
		self.request(Method::GET, &format!("/v1.2/order/{}", uuid), None)
			.await
	}

	/// Update an order identified by `order.model.uuid`
	pub async fn update_order(&self, order: &Order) -> Result<Vec<Order>, ClientError> {
		let uuid = order
			.model
			.uuid
			.as_deref()
			.filter(|uuid| !uuid.is_empty())
			.ok_or_else(|| ClientError::InvalidRequest("order.model.uuid is required".to_string()))?;

		let payload = canonical::to_value(order)?;
		let result: Option<Vec<Order>> = self
			.request(Method::PATCH, &format!("/v1.2/order/{}", uuid), Some(&payload))
			.await?;
		Ok(result.unwrap_or_default())
	}

	/// Delete an order by UUID
	pub async fn delete_order(&self, uuid: &str) -> Result<(), ClientError> {
		self.request::<Value>(Method::DELETE, &format!("/v1.2/order/{}", uuid), None)
			.await?;
		Ok(())
	}

	/// Integral amount per currency for the authenticated user
	pub async fn summarize_integral_amount(&self) -> Result<BTreeMap<String, f64>, ClientError> {
		let result: Option<BTreeMap<String, f64>> = self
			.request(Method::GET, "/v1.2/user/summarize-integral-amount", None)
			.await?;
		Ok(result.unwrap_or_default())
	}

	/// Create a user order
	pub async fn create_user_order(
		&self,
		user_order: &UserOrder,
	) -> Result<Vec<UserOrder>, ClientError> {
		let payload = canonical::to_value(user_order)?;
		let result: Option<Vec<UserOrder>> = self
			.request(Method::PUT, "/v1.2/user-order", Some(&payload))
			.await?;
		Ok(result.unwrap_or_default())
	}

	/// Verify an order callback and parse its body
	pub fn handle_order_callback(&self, request: &CallbackRequest) -> Result<Order, ClientError> {
		let payload = self.verifier.verify(request)?;
		payload
			.parse()
			.map_err(|e| ClientError::Serialization(format!("Invalid callback body: {}", e)))
	}
}

/// Synchronous client wrapper (for compatibility)
///
/// This wraps the async client and runs it in a tokio runtime.
/// For new code, prefer using the async Client directly.
pub struct SyncClient {
	client: Client,
	runtime: tokio::runtime::Runtime,
}

impl SyncClient {
	/// Create a new synchronous client
	pub fn new(config: ClientConfig) -> Result<Self, ClientError> {
		let runtime = tokio::runtime::Runtime::new()
			.map_err(|e| ClientError::Runtime(format!("Failed to create tokio runtime: {}", e)))?;
		Ok(Self {
			client: Client::new(config)?,
			runtime,
		})
	}

	pub fn client(&self) -> &Client {
		&self.client
	}

	pub fn create_merchant_order(
		&self,
		merchant_order: MerchantOrder,
	) -> Result<Vec<MerchantOrder>, ClientError> {
		self.runtime
			.block_on(self.client.create_merchant_order(merchant_order))
	}

	pub fn describe_order(&self, uuid: &str) -> Result<Option<Order>, ClientError> {
		self.runtime.block_on(self.client.describe_order(uuid))
	}

	pub fn update_order(&self, order: &Order) -> Result<Vec<Order>, ClientError> {
		self.runtime.block_on(self.client.update_order(order))
	}

	pub fn delete_order(&self, uuid: &str) -> Result<(), ClientError> {
		self.runtime.block_on(self.client.delete_order(uuid))
	}

	pub fn summarize_integral_amount(&self) -> Result<BTreeMap<String, f64>, ClientError> {
		self.runtime
			.block_on(self.client.summarize_integral_amount())
	}

	pub fn create_user_order(&self, user_order: &UserOrder) -> Result<Vec<UserOrder>, ClientError> {
		self.runtime
			.block_on(self.client.create_user_order(user_order))
	}

	pub fn handle_order_callback(&self, request: &CallbackRequest) -> Result<Order, ClientError> {
		self.client.handle_order_callback(request)
	}
}
