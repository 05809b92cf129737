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

//! Canonical JSON encoding for request signing
//!
//! The signing string embeds the request body in a canonical form so that the
//! signer and an independent verifier derive identical bytes from the same
//! logical value, regardless of how the JSON was produced or transmitted:
//!
//! - Object keys are sorted by their string value at every depth
//! - Separators are `,` and `:` with no whitespace
//! - Strings are ASCII-only; everything outside printable ASCII is written as
//!   a lowercase `\uXXXX` escape (surrogate pairs above U+FFFF)
//! - Integers keep every digit; floats use the shortest round-trip digits,
//!   switching to exponent form (`1e-05`, `1e+16`) outside `[1e-4, 1e16)`
//!   and always carrying a fraction or exponent (`100.0`)
//! - An absent body encodes to zero bytes, which is NOT the same as `{}`
//!
//! This encoding is used only for signing. It is never parsed back.

use serde::Serialize;
use serde_json::Value;

use crate::signing::SigningError;

/// Convert a typed payload into a JSON value suitable for canonical encoding.
///
/// Fails with [`SigningError::Encoding`] when the payload has no JSON
/// representation (for example a map with non-string keys).
pub fn to_value<T: Serialize + ?Sized>(payload: &T) -> Result<Value, SigningError> {
	serde_json::to_value(payload).map_err(|e| SigningError::Encoding(e.to_string()))
}

/// Encode an optional payload into its canonical byte form.
///
/// `None` yields an empty vector.
pub fn encode(payload: Option<&Value>) -> Vec<u8> {
	let mut out = Vec::new();
	if let Some(value) = payload {
		write_value(&mut out, value);
	}
	out
}

/// Encode a typed payload, converting it to a JSON value first.
pub fn encode_serializable<T: Serialize + ?Sized>(payload: &T) -> Result<Vec<u8>, SigningError> {
	let value = to_value(payload)?;
	Ok(encode(Some(&value)))
}

fn write_value(out: &mut Vec<u8>, value: &Value) {
	match value {
		Value::Null => out.extend_from_slice(b"null"),
		Value::Bool(true) => out.extend_from_slice(b"true"),
		Value::Bool(false) => out.extend_from_slice(b"false"),
		Value::Number(n) => write_number(out, &n.to_string()),
		Value::String(s) => write_string(out, s),
		Value::Array(items) => {
			out.push(b'[');
			for (i, item) in items.iter().enumerate() {
				if i > 0 {
					out.push(b',');
				}
				write_value(out, item);
			}
			out.push(b']');
		}
		Value::Object(map) => {
			// Sort explicitly: serde_json's map ordering depends on the
			// `preserve_order` feature, which another crate may switch on.
			let mut entries: Vec<(&String, &Value)> = map.iter().collect();
			entries.sort_by(|a, b| a.0.cmp(b.0));

			out.push(b'{');
			for (i, (key, item)) in entries.into_iter().enumerate() {
				if i > 0 {
					out.push(b',');
				}
				write_string(out, key);
				out.push(b':');
				write_value(out, item);
			}
			out.push(b'}');
		}
	}
}

/// `lexical` is the number as parsed; a `.` or exponent marks a float.
fn write_number(out: &mut Vec<u8>, lexical: &str) {
	if !lexical.contains(['.', 'e', 'E']) {
		// -0 is an integer zero
		if lexical.trim_start_matches('-').bytes().all(|b| b == b'0') {
			out.push(b'0');
		} else {
			out.extend_from_slice(lexical.as_bytes());
		}
		return;
	}

	match lexical.parse::<f64>() {
		Ok(float) if float.is_finite() => write_float(out, float),
		Ok(float) if float.is_sign_negative() => out.extend_from_slice(b"-Infinity"),
		Ok(_) => out.extend_from_slice(b"Infinity"),
		Err(_) => out.extend_from_slice(lexical.as_bytes()),
	}
}

fn write_float(out: &mut Vec<u8>, float: f64) {
	if float.is_sign_negative() {
		out.push(b'-');
	}

	// `{:e}` yields the shortest round-trip digits as `d[.ddd]e<exp>`
	let scientific = format!("{:e}", float.abs());
	let (mantissa, exp) = scientific.split_once('e').unwrap_or((scientific.as_str(), "0"));
	let exp: i32 = exp.parse().unwrap_or(0);
	let digits: String = mantissa.chars().filter(|c| *c != '.').collect();

	if !(-4..16).contains(&exp) {
		out.extend_from_slice(digits[..1].as_bytes());
		if digits.len() > 1 {
			out.push(b'.');
			out.extend_from_slice(digits[1..].as_bytes());
		}
		let sign = if exp < 0 { '-' } else { '+' };
		out.extend_from_slice(format!("e{}{:02}", sign, exp.unsigned_abs()).as_bytes());
		return;
	}

	// Position of the decimal point relative to the first digit
	let point = exp + 1;
	if point <= 0 {
		out.extend_from_slice(b"0.");
		out.extend(std::iter::repeat_n(b'0', point.unsigned_abs() as usize));
		out.extend_from_slice(digits.as_bytes());
		return;
	}

	let point = point as usize;
	if digits.len() > point {
		out.extend_from_slice(digits[..point].as_bytes());
		out.push(b'.');
		out.extend_from_slice(digits[point..].as_bytes());
	} else {
		out.extend_from_slice(digits.as_bytes());
		out.extend(std::iter::repeat_n(b'0', point - digits.len()));
		out.extend_from_slice(b".0");
	}
}

fn write_string(out: &mut Vec<u8>, s: &str) {
	out.push(b'"');
	for ch in s.chars() {
		match ch {
			'"' => out.extend_from_slice(b"\\\""),
			'\\' => out.extend_from_slice(b"\\\\"),
			'\n' => out.extend_from_slice(b"\\n"),
			'\r' => out.extend_from_slice(b"\\r"),
			'\t' => out.extend_from_slice(b"\\t"),
			'\u{08}' => out.extend_from_slice(b"\\b"),
			'\u{0c}' => out.extend_from_slice(b"\\f"),
			' '..='~' => out.push(ch as u8),
			_ => {
				let mut units = [0u16; 2];
				for unit in ch.encode_utf16(&mut units) {
					out.extend_from_slice(format!("\\u{:04x}", unit).as_bytes());
				}
			}
		}
	}
	out.push(b'"');
}
