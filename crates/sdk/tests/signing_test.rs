//! Integration tests for request signing and callback verification
//!
//! These tests verify:
//! - The concrete order callback scenario
//! - Sign/verify round trips for arbitrary payloads
//! - Tamper sensitivity of every signed component
//! - Rejection under a different credential
//! - Nonce uniqueness across concurrent signers

use std::{collections::HashSet, sync::Arc, thread};

use mangrove_sdk::{
	CallbackRequest, CallbackVerifier, Credential, RequestSigner, SigningHeaders,
	VerificationError, canonical, signing,
};
use proptest::prelude::*;
use serde_json::{Value, json};

const IDENTITY: &str = "sbSO9eCvjQkE38hVnrVy4TiD";
const SECRET: &str = "ER3wT3UP05TVEyh8CdMnZsCz5I1j0z";
const HOST: &str = "10.0.0.254:4003";

fn credential() -> Credential {
	Credential::new(IDENTITY, SECRET).unwrap()
}

fn signed_request(
	signer: &RequestSigner,
	method: &str,
	path: &str,
	body: Option<Value>,
) -> CallbackRequest {
	let signed = signer.build_headers(method, path, body.as_ref()).unwrap();
	let mut request = CallbackRequest::new(method, path);
	for (name, value) in signed.pairs() {
		request = request.with_header(name, value);
	}
	request.body = body;
	request
}

/// Replace the byte at `index` with a different printable ASCII byte.
fn flip_byte(value: &str, index: usize) -> String {
	let mut bytes = value.as_bytes().to_vec();
	let i = index % bytes.len();
	bytes[i] = if bytes[i] == b'x' { b'y' } else { b'x' };
	String::from_utf8(bytes).unwrap()
}

fn assert_invalid(request: &CallbackRequest) {
	match CallbackVerifier::new(credential()).verify(request) {
		Err(VerificationError::InvalidSignature) => {}
		other => panic!("expected invalid signature, got {:?}", other),
	}
}

#[test]
fn test_order_callback_scenario() {
	let headers = SigningHeaders::new(HOST, IDENTITY, 1_718_000_000_000, "1b4e28ba-2fa1-11d2-883f-0016d3cca427");
	let body = json!({"code": "order123", "status": "completed"});

	let signature = signing::sign(
		&credential(),
		"POST",
		"/v1.2/order/callback",
		&headers,
		Some(&body),
	)
	.unwrap();
	assert_eq!(signature.len(), 128);
	assert_eq!(
		signature,
		signing::sign(&credential(), "POST", "/v1.2/order/callback", &headers, Some(&body)).unwrap()
	);

	let mut request = CallbackRequest::new("POST", "/v1.2/order/callback")
		.with_header("content-type", headers.content_type.clone())
		.with_header("host", headers.host.clone())
		.with_header("x-guarder-id", headers.guarder_id.clone())
		.with_header("x-guarder-signed-at", headers.signed_at.clone())
		.with_header("x-guarder-uuid", headers.nonce.clone())
		.with_header("Authorization", format!("Signature {}", signature))
		.with_body(body);

	let verified = CallbackVerifier::new(credential()).verify(&request).unwrap();
	assert_eq!(verified.body().unwrap()["status"], "completed");

	request.body = Some(json!({"code": "order123", "status": "failed"}));
	assert_invalid(&request);
}

#[test]
fn test_key_order_independent_signature() {
	let headers = SigningHeaders::new(HOST, IDENTITY, 1, "n");
	let a: Value = serde_json::from_str(r#"{"b":1,"a":{"d":2,"c":3}}"#).unwrap();
	let b: Value = serde_json::from_str(r#"{"a":{"c":3,"d":2},"b":1}"#).unwrap();

	assert_eq!(canonical::encode(Some(&a)), canonical::encode(Some(&b)));
	assert_eq!(
		signing::sign(&credential(), "PUT", "/p", &headers, Some(&a)).unwrap(),
		signing::sign(&credential(), "PUT", "/p", &headers, Some(&b)).unwrap()
	);
}

#[test]
fn test_concurrent_signers_never_reuse_nonce() {
	let signer = Arc::new(RequestSigner::new(credential(), HOST).unwrap());

	let handles: Vec<_> = (0..8)
		.map(|_| {
			let signer = Arc::clone(&signer);
			thread::spawn(move || {
				(0..250)
					.map(|_| {
						let signed = signer.build_headers("GET", "/v1.2/order/abc", None).unwrap();
						(signed.headers.signed_at, signed.headers.nonce)
					})
					.collect::<Vec<_>>()
			})
		})
		.collect();

	let mut seen = HashSet::new();
	for handle in handles {
		for pair in handle.join().unwrap() {
			assert!(seen.insert(pair), "nonce/timestamp pair reused");
		}
	}
	assert_eq!(seen.len(), 2000);
}

fn json_value() -> impl Strategy<Value = Value> {
	let leaf = prop_oneof![
		Just(Value::Null),
		any::<bool>().prop_map(Value::Bool),
		any::<i64>().prop_map(|n| json!(n)),
		"\\PC{0,12}".prop_map(Value::String),
	];
	leaf.prop_recursive(3, 24, 4, |inner| {
		prop_oneof![
			prop::collection::vec(inner.clone(), 0..4).prop_map(Value::Array),
			prop::collection::btree_map("[a-z_]{1,6}", inner, 0..4)
				.prop_map(|map| Value::Object(map.into_iter().collect())),
		]
	})
}

fn http_method() -> impl Strategy<Value = &'static str> {
	prop_oneof![
		Just("GET"),
		Just("PUT"),
		Just("POST"),
		Just("PATCH"),
		Just("DELETE")
	]
}

proptest! {
	#[test]
	fn prop_round_trip(
		method in http_method(),
		path in "/v1\\.2/[a-z0-9/\\-]{1,24}",
		body in prop::option::of(json_value()),
	) {
		let signer = RequestSigner::new(credential(), HOST).unwrap();
		let request = signed_request(&signer, method, &path, body.clone());
		let verified = CallbackVerifier::new(credential()).verify(&request).unwrap();
		prop_assert_eq!(verified.into_body(), body);
	}

	#[test]
	fn prop_tampered_path_or_method_rejected(
		method in http_method(),
		path in "/v1\\.2/[a-z0-9/\\-]{1,24}",
		index in any::<usize>(),
	) {
		let signer = RequestSigner::new(credential(), HOST).unwrap();
		let request = signed_request(&signer, method, &path, Some(json!({"code": "c"})));

		let mut tampered = request.clone();
		tampered.path = flip_byte(&request.path, index);
		assert_invalid(&tampered);

		let mut tampered = request.clone();
		tampered.method = flip_byte(&request.method, index);
		assert_invalid(&tampered);
	}

	#[test]
	fn prop_tampered_header_rejected(
		header in prop_oneof![
			Just("content-type"),
			Just("host"),
			Just("x-guarder-id"),
			Just("x-guarder-signed-at"),
			Just("x-guarder-uuid"),
		],
		index in any::<usize>(),
	) {
		let signer = RequestSigner::new(credential(), HOST).unwrap();
		let mut request = signed_request(&signer, "POST", "/v1.2/order/callback", None);
		let original = request.header(header).unwrap().to_string();
		request.headers.insert(header.to_string(), flip_byte(&original, index));
		assert_invalid(&request);
	}

	#[test]
	fn prop_tampered_payload_rejected(
		status in "[a-z]{1,10}",
		index in any::<usize>(),
	) {
		let signer = RequestSigner::new(credential(), HOST).unwrap();
		let mut request = signed_request(
			&signer,
			"POST",
			"/v1.2/order/callback",
			Some(json!({"code": "order123", "status": status.clone()})),
		);
		request.body = Some(json!({"code": "order123", "status": flip_byte(&status, index)}));
		assert_invalid(&request);
	}

	#[test]
	fn prop_cross_credential_rejected(
		secret_a in "[A-Za-z0-9]{1,40}",
		secret_b in "[A-Za-z0-9]{1,40}",
	) {
		prop_assume!(secret_a != secret_b);
		let signer = RequestSigner::new(Credential::new(IDENTITY, secret_a).unwrap(), HOST).unwrap();
		let request = signed_request(&signer, "POST", "/v1.2/order/callback", Some(json!({"a": 1})));

		let other = CallbackVerifier::new(Credential::new(IDENTITY, secret_b).unwrap());
		prop_assert!(matches!(other.verify(&request), Err(VerificationError::InvalidSignature)));
	}
}
