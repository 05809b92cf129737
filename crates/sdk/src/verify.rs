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

//! Callback signature verification
//!
//! The service signs the callbacks it sends with the same scheme used for
//! outbound requests. A callback is trusted only after the verifier has
//! recomputed the signature over the received method, path, signed headers
//! and body, and compared it to the presented `Authorization` value in
//! constant time.
//!
//! Any failure rejects the whole callback. The body is never handed out
//! before the signature has been checked.

use std::collections::HashMap;

use serde::de::DeserializeOwned;
use serde_json::Value;
use subtle::ConstantTimeEq;
use thiserror::Error;
use tracing::warn;

use crate::signing::{
	self, Credential, HEADER_AUTHORIZATION, HEADER_CONTENT_TYPE, HEADER_GUARDER_ID, HEADER_HOST,
	HEADER_NONCE, HEADER_SIGNED_AT, SIGNATURE_HEX_LEN, SIGNATURE_SCHEME, SigningError,
	SigningHeaders,
};

/// Error types for callback verification
#[derive(Debug, Error)]
pub enum VerificationError {
	#[error("Missing header: {0}")]
	MissingHeader(&'static str),
	#[error("Malformed authorization: {0}")]
	MalformedAuthorization(String),
	#[error("Invalid signature")]
	InvalidSignature,
	#[error("Signing error: {0}")]
	Signing(#[from] SigningError),
}

/// Inbound callback as received from the service
#[derive(Debug, Clone, Default, PartialEq)]
pub struct CallbackRequest {
	pub method: String,
	pub path: String,
	/// Header names are matched ASCII case-insensitively.
	pub headers: HashMap<String, String>,
	pub body: Option<Value>,
}

impl CallbackRequest {
	pub fn new(method: impl Into<String>, path: impl Into<String>) -> Self {
		Self {
			method: method.into(),
			path: path.into(),
			headers: HashMap::new(),
			body: None,
		}
	}

	pub fn with_header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
		self.headers.insert(name.into(), value.into());
		self
	}

	pub fn with_body(mut self, body: Value) -> Self {
		self.body = Some(body);
		self
	}

	/// Look up a header value, ignoring name case.
	pub fn header(&self, name: &str) -> Option<&str> {
		self.headers
			.iter()
			.find(|(key, _)| key.eq_ignore_ascii_case(name))
			.map(|(_, value)| value.as_str())
	}

	fn required_header(&self, name: &'static str) -> Result<String, VerificationError> {
		self.header(name)
			.map(str::to_string)
			.ok_or(VerificationError::MissingHeader(name))
	}

	/// Extract the five signed headers in canonical order.
	pub fn signing_headers(&self) -> Result<SigningHeaders, VerificationError> {
		Ok(SigningHeaders {
			content_type: self.required_header(HEADER_CONTENT_TYPE)?,
			host: self.required_header(HEADER_HOST)?,
			guarder_id: self.required_header(HEADER_GUARDER_ID)?,
			signed_at: self.required_header(HEADER_SIGNED_AT)?,
			nonce: self.required_header(HEADER_NONCE)?,
		})
	}
}

/// Callback body whose signature has been verified
#[derive(Debug, Clone, PartialEq)]
pub struct VerifiedPayload {
	body: Option<Value>,
	headers: SigningHeaders,
}

impl VerifiedPayload {
	pub fn body(&self) -> Option<&Value> {
		self.body.as_ref()
	}

	/// Signed headers of the verified request (identity, timestamp, nonce).
	pub fn headers(&self) -> &SigningHeaders {
		&self.headers
	}

	pub fn into_body(self) -> Option<Value> {
		self.body
	}

	/// Deserialize the verified body into a typed value.
	///
	/// An absent body deserializes from JSON `null`.
	pub fn parse<T: DeserializeOwned>(&self) -> Result<T, serde_json::Error> {
		serde_json::from_value(self.body.clone().unwrap_or(Value::Null))
	}
}

/// Verifies inbound callbacks against one credential
#[derive(Debug, Clone)]
pub struct CallbackVerifier {
	credential: Credential,
}

impl CallbackVerifier {
	pub fn new(credential: Credential) -> Self {
		Self { credential }
	}

	/// Verify a callback and release its body.
	pub fn verify(&self, request: &CallbackRequest) -> Result<VerifiedPayload, VerificationError> {
		verify(request, &self.credential)
	}
}

/// Verify a callback with the given credential.
///
/// An absent `Authorization` header is reported as
/// [`VerificationError::MissingHeader`]; a present value that is not
/// `Signature <hex>` is [`VerificationError::MalformedAuthorization`].
pub fn verify(
	request: &CallbackRequest,
	credential: &Credential,
) -> Result<VerifiedPayload, VerificationError> {
	let result = verify_inner(request, credential);
	if let Err(ref e) = result {
		warn!(
			method = %request.method,
			path = %request.path,
			error = %e,
			"Callback verification failed"
		);
	}
	result
}

fn verify_inner(
	request: &CallbackRequest,
	credential: &Credential,
) -> Result<VerifiedPayload, VerificationError> {
	let headers = request.signing_headers()?;

	let expected = signing::digest(
		credential,
		&request.method,
		&request.path,
		&headers,
		request.body.as_ref(),
	)?;

	let authorization = request
		.header(HEADER_AUTHORIZATION)
		.ok_or(VerificationError::MissingHeader("authorization"))?;
	let presented = parse_authorization(authorization)?;

	if !bool::from(expected.as_slice().ct_eq(presented.as_slice())) {
		return Err(VerificationError::InvalidSignature);
	}

	Ok(VerifiedPayload {
		body: request.body.clone(),
		headers,
	})
}

/// Parse `Signature <128 lowercase hex>` into raw digest bytes.
pub fn parse_authorization(value: &str) -> Result<Vec<u8>, VerificationError> {
	let hex_sig = value
		.strip_prefix(SIGNATURE_SCHEME)
		.and_then(|rest| rest.strip_prefix(' '))
		.ok_or_else(|| {
			VerificationError::MalformedAuthorization(format!(
				"expected \"{} <hex>\"",
				SIGNATURE_SCHEME
			))
		})?;

	if hex_sig.len() != SIGNATURE_HEX_LEN {
		return Err(VerificationError::MalformedAuthorization(format!(
			"expected {} hex characters, got {}",
			SIGNATURE_HEX_LEN,
			hex_sig.len()
		)));
	}
	if !hex_sig
		.bytes()
		.all(|b| b.is_ascii_digit() || (b'a'..=b'f').contains(&b))
	{
		return Err(VerificationError::MalformedAuthorization(
			"signature is not lowercase hex".to_string(),
		));
	}

	hex::decode(hex_sig).map_err(|e| VerificationError::MalformedAuthorization(e.to_string()))
}

#[cfg(test)]
mod tests {
	use serde_json::json;

	use super::*;
	use crate::signing::RequestSigner;

	const IDENTITY: &str = "sbSO9eCvjQkE38hVnrVy4TiD";
	const SECRET: &str = "ER3wT3UP05TVEyh8CdMnZsCz5I1j0z";

	fn credential() -> Credential {
		Credential::new(IDENTITY, SECRET).unwrap()
	}

	fn signed_callback(body: Option<Value>) -> CallbackRequest {
		let signer = RequestSigner::new(credential(), "10.0.0.254:4003").unwrap();
		let signed = signer
			.build_headers("POST", "/v1.2/order/callback", body.as_ref())
			.unwrap();

		let mut request = CallbackRequest::new("POST", "/v1.2/order/callback");
		for (name, value) in signed.pairs() {
			request = request.with_header(name, value);
		}
		request.body = body;
		request
	}

	#[test]
	fn test_verify_accepts_signed_callback() {
		let body = json!({"code": "order123", "status": "completed"});
		let request = signed_callback(Some(body.clone()));

		let payload = CallbackVerifier::new(credential()).verify(&request).unwrap();
		assert_eq!(payload.body(), Some(&body));
		assert_eq!(payload.headers().guarder_id, IDENTITY);
	}

	#[test]
	fn test_verify_accepts_signed_callback_without_body() {
		let request = signed_callback(None);
		let payload = verify(&request, &credential()).unwrap();
		assert!(payload.body().is_none());
	}

	#[test]
	fn test_tampered_status_rejected() {
		let mut request = signed_callback(Some(json!({"code": "order123", "status": "completed"})));
		request.body = Some(json!({"code": "order123", "status": "failed"}));

		let err = verify(&request, &credential()).unwrap_err();
		assert!(matches!(err, VerificationError::InvalidSignature));
	}

	#[test]
	fn test_header_names_case_insensitive() {
		let request = signed_callback(Some(json!({"a": 1})));
		let mut upper = CallbackRequest::new(request.method.clone(), request.path.clone());
		for (name, value) in &request.headers {
			upper = upper.with_header(name.to_ascii_uppercase(), value.clone());
		}
		upper.body = request.body.clone();
		assert!(verify(&upper, &credential()).is_ok());
	}

	#[test]
	fn test_missing_header_rejected() {
		for name in [
			"content-type",
			"host",
			"x-guarder-id",
			"x-guarder-signed-at",
			"x-guarder-uuid",
		] {
			let mut request = signed_callback(None);
			request.headers.remove(name);
			match verify(&request, &credential()) {
				Err(VerificationError::MissingHeader(missing)) => assert_eq!(missing, name),
				other => panic!("expected missing header {}, got {:?}", name, other),
			}
		}
	}

	#[test]
	fn test_missing_authorization_rejected() {
		let mut request = signed_callback(None);
		request.headers.remove("Authorization");
		assert!(matches!(
			verify(&request, &credential()),
			Err(VerificationError::MissingHeader("authorization"))
		));
	}

	#[test]
	fn test_malformed_authorization_rejected() {
		let good = signed_callback(None);
		let signature = good.header("Authorization").unwrap()[10..].to_string();

		for bad in [
			signature.clone(),
			format!("Bearer {}", signature),
			format!("Signature  {}", signature),
			format!("Signature {}", &signature[..64]),
			format!("Signature {}", signature.to_ascii_uppercase()),
			format!("Signature {}z", &signature[..127]),
		] {
			let mut request = good.clone();
			request.headers.insert("Authorization".to_string(), bad.clone());
			assert!(
				matches!(
					verify(&request, &credential()),
					Err(VerificationError::MalformedAuthorization(_))
				),
				"accepted malformed authorization {:?}",
				bad
			);
		}
	}

	#[test]
	fn test_wrong_credential_rejected() {
		let request = signed_callback(Some(json!({"code": "order123"})));
		let other = Credential::new(IDENTITY, "another-secret").unwrap();
		assert!(matches!(
			verify(&request, &other),
			Err(VerificationError::InvalidSignature)
		));
	}

	#[test]
	fn test_parse_verified_body() {
		#[derive(serde::Deserialize)]
		struct Callback {
			code: String,
		}

		let request = signed_callback(Some(json!({"code": "order123", "status": "completed"})));
		let payload = verify(&request, &credential()).unwrap();
		let parsed: Callback = payload.parse().unwrap();
		assert_eq!(parsed.code, "order123");
	}
}
