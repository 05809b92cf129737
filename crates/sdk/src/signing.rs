// Copyright 2025 chenjjiaa
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

//! Request signing
//!
//! Every outbound call carries five signed headers and an `Authorization`
//! header holding an HMAC-SHA-512 digest over the signing string:
//!
//! ```text
//! <METHOD> <path>\r\n
//! content-type: application/json\r\n
//! host: <host>\r\n
//! x-guarder-id: <identity>\r\n
//! x-guarder-signed-at: <epoch ms>\r\n
//! x-guarder-uuid: <uuid>\r\n
//! \r\n
//! <canonical body or empty>
//! ```
//!
//! The same routine recomputes the digest when verifying inbound callbacks,
//! see [`crate::verify`].

use std::fmt;

use hmac::{Hmac, Mac};
use serde_json::Value;
use sha2::Sha512;
use tracing::debug;
use uuid::Uuid;

use crate::canonical;

type HmacSha512 = Hmac<Sha512>;

pub const HEADER_CONTENT_TYPE: &str = "content-type";
pub const HEADER_HOST: &str = "host";
pub const HEADER_GUARDER_ID: &str = "x-guarder-id";
pub const HEADER_SIGNED_AT: &str = "x-guarder-signed-at";
pub const HEADER_NONCE: &str = "x-guarder-uuid";
pub const HEADER_AUTHORIZATION: &str = "Authorization";

/// Content type of every signed request
pub const CONTENT_TYPE_JSON: &str = "application/json";

/// Scheme prefix of the `Authorization` header value
pub const SIGNATURE_SCHEME: &str = "Signature";

/// Length of a hex-encoded HMAC-SHA-512 digest
pub const SIGNATURE_HEX_LEN: usize = 128;

/// Error types for signing operations
#[derive(Debug, thiserror::Error)]
pub enum SigningError {
	#[error("Configuration error: {0}")]
	Configuration(String),
	#[error("Encoding error: {0}")]
	Encoding(String),
}

/// Shared-secret credential issued by the service
///
/// The secret never appears in `Debug` output or logs.
#[derive(Clone, PartialEq, Eq)]
pub struct Credential {
	identity: String,
	secret: Vec<u8>,
}

impl Credential {
	/// Create a credential, rejecting an empty identity or secret.
	pub fn new(identity: impl Into<String>, secret: impl Into<Vec<u8>>) -> Result<Self, SigningError> {
		let identity = identity.into();
		let secret = secret.into();
		if identity.is_empty() {
			return Err(SigningError::Configuration(
				"credential identity is empty".to_string(),
			));
		}
		if secret.is_empty() {
			return Err(SigningError::Configuration(
				"credential secret is empty".to_string(),
			));
		}
		Ok(Self { identity, secret })
	}

	pub fn identity(&self) -> &str {
		&self.identity
	}

	fn mac(&self) -> Result<HmacSha512, SigningError> {
		HmacSha512::new_from_slice(&self.secret)
			.map_err(|e| SigningError::Configuration(format!("Invalid HMAC key: {}", e)))
	}
}

impl fmt::Debug for Credential {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		f.debug_struct("Credential")
			.field("identity", &self.identity)
			.field("secret", &"<redacted>")
			.finish()
	}
}

/// The five headers covered by the signature, in signing order
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SigningHeaders {
	pub content_type: String,
	pub host: String,
	pub guarder_id: String,
	pub signed_at: String,
	pub nonce: String,
}

impl SigningHeaders {
	/// Headers for an outbound JSON request.
	pub fn new(
		host: impl Into<String>,
		guarder_id: impl Into<String>,
		signed_at: i64,
		nonce: impl Into<String>,
	) -> Self {
		Self {
			content_type: CONTENT_TYPE_JSON.to_string(),
			host: host.into(),
			guarder_id: guarder_id.into(),
			signed_at: signed_at.to_string(),
			nonce: nonce.into(),
		}
	}

	/// Header name/value pairs in canonical order.
	pub fn pairs(&self) -> [(&'static str, &str); 5] {
		[
			(HEADER_CONTENT_TYPE, &self.content_type),
			(HEADER_HOST, &self.host),
			(HEADER_GUARDER_ID, &self.guarder_id),
			(HEADER_SIGNED_AT, &self.signed_at),
			(HEADER_NONCE, &self.nonce),
		]
	}
}

/// Signed header set ready to attach to a request
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SignedHeaders {
	pub headers: SigningHeaders,
	pub signature: String,
}

impl SignedHeaders {
	/// Value of the `Authorization` header.
	pub fn authorization(&self) -> String {
		format!("{} {}", SIGNATURE_SCHEME, self.signature)
	}

	/// All six headers, signed ones first and `Authorization` last.
	pub fn pairs(&self) -> Vec<(&'static str, String)> {
		let mut pairs: Vec<(&'static str, String)> = self
			.headers
			.pairs()
			.into_iter()
			.map(|(name, value)| (name, value.to_string()))
			.collect();
		pairs.push((HEADER_AUTHORIZATION, self.authorization()));
		pairs
	}
}

/// Build the exact byte sequence that gets signed.
///
/// The method and path are used as given; callers are responsible for
/// passing the method exactly as it goes on the wire.
pub fn signing_string(
	method: &str,
	path: &str,
	headers: &SigningHeaders,
	encoded_payload: &[u8],
) -> Vec<u8> {
	let mut message = Vec::with_capacity(256 + encoded_payload.len());
	message.extend_from_slice(method.as_bytes());
	message.push(b' ');
	message.extend_from_slice(path.as_bytes());
	for (name, value) in headers.pairs() {
		message.extend_from_slice(b"\r\n");
		message.extend_from_slice(name.as_bytes());
		message.extend_from_slice(b": ");
		message.extend_from_slice(value.as_bytes());
	}
	// Blank separator line, then the body
	message.extend_from_slice(b"\r\n\r\n");
	message.extend_from_slice(encoded_payload);
	message
}

/// Compute the raw HMAC-SHA-512 digest for a request.
pub(crate) fn digest(
	credential: &Credential,
	method: &str,
	path: &str,
	headers: &SigningHeaders,
	payload: Option<&Value>,
) -> Result<Vec<u8>, SigningError> {
	let encoded = canonical::encode(payload);
	let message = signing_string(method, path, headers, &encoded);

	let mut mac = credential.mac()?;
	mac.update(&message);
	Ok(mac.finalize().into_bytes().to_vec())
}

/// Signs outbound requests on behalf of one credential
///
/// The signer holds no mutable state and can be shared across threads.
#[derive(Debug, Clone)]
pub struct RequestSigner {
	credential: Credential,
	host: String,
}

impl RequestSigner {
	/// Create a signer for requests sent to `host` (the `host[:port]` authority
	/// of the service endpoint).
	pub fn new(credential: Credential, host: impl Into<String>) -> Result<Self, SigningError> {
		let host = host.into();
		if host.is_empty() {
			return Err(SigningError::Configuration("service host is empty".to_string()));
		}
		Ok(Self { credential, host })
	}

	pub fn credential(&self) -> &Credential {
		&self.credential
	}

	pub fn host(&self) -> &str {
		&self.host
	}

	/// Produce the full header set for a new request.
	///
	/// Each call stamps a fresh timestamp and nonce, so two calls with the
	/// same arguments yield different signatures.
	pub fn build_headers(
		&self,
		method: &str,
		path: &str,
		payload: Option<&Value>,
	) -> Result<SignedHeaders, SigningError> {
		let headers = SigningHeaders::new(
			self.host.as_str(),
			self.credential.identity(),
			chrono::Utc::now().timestamp_millis(),
			Uuid::new_v4().to_string(),
		);
		let signature = self.sign(method, path, &headers, payload)?;

		debug!(
			method = %method,
			path = %path,
			signed_at = %headers.signed_at,
			nonce = %headers.nonce,
			"Signed outbound request"
		);

		Ok(SignedHeaders { headers, signature })
	}

	/// Compute the lowercase hex signature for a request.
	///
	/// Deterministic for fixed inputs.
	pub fn sign(
		&self,
		method: &str,
		path: &str,
		headers: &SigningHeaders,
		payload: Option<&Value>,
	) -> Result<String, SigningError> {
		sign(&self.credential, method, path, headers, payload)
	}
}

/// Compute the lowercase hex signature for a request with the given credential.
pub fn sign(
	credential: &Credential,
	method: &str,
	path: &str,
	headers: &SigningHeaders,
	payload: Option<&Value>,
) -> Result<String, SigningError> {
	digest(credential, method, path, headers, payload).map(hex::encode)
}
