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

use serde::{Deserialize, Deserializer, Serialize};
use serde_json::Value;

/// Read an optional integer through `Value`.
///
/// Numbers keep their exact digits, so inside a struct with a flattened
/// field serde buffers them in a form plain `i64` fields cannot read back.
fn integer<'de, D>(deserializer: D) -> Result<Option<i64>, D::Error>
where
	D: Deserializer<'de>,
{
	match Option::<Value>::deserialize(deserializer)? {
		None | Some(Value::Null) => Ok(None),
		Some(Value::Number(n)) => n
			.as_i64()
			.map(Some)
			.ok_or_else(|| serde::de::Error::custom(format!("integer out of range: {}", n))),
		Some(other) => Err(serde::de::Error::custom(format!(
			"expected integer, got {}",
			other
		))),
	}
}

/// Response envelope returned by every endpoint
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ApiResponse<T> {
	pub code: Option<i64>,
	pub message: Option<String>,
	pub data: Option<T>,
}

/// Persistence metadata shared by all entities
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Model {
	pub id: Option<String>,
	pub uuid: Option<String>,
	#[serde(deserialize_with = "integer")]
	pub version: Option<i64>,
	pub deleted_at: Option<String>,
	pub created_at: Option<String>,
	pub updated_at: Option<String>,
}

/// Display name and description
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct NamedModel {
	pub name: Option<String>,
	pub description: Option<String>,
}

/// Ownership references
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct OwnedModel {
	pub user: Option<User>,
	pub owner: Option<User>,
}

/// Where the service delivers order status callbacks
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct OrderCallback {
	pub endpoint: Option<String>,
	pub model: Model,
}

/// Order as seen by the service
///
/// Amounts are decimal strings. Fields the SDK does not know about are kept
/// in `extra` so they survive a deserialize/serialize cycle.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Order {
	pub order_transaction_id: Option<String>,
	pub status: Option<String>,
	pub amount: Option<String>,
	pub integral_amount: Option<String>,
	pub external_id: Option<String>,
	pub code: Option<String>,
	pub order_callback: OrderCallback,
	pub model: Model,
	pub named_model: NamedModel,
	pub owned_model: OwnedModel,
	#[serde(flatten)]
	pub extra: BTreeMap<String, Value>,
}

/// Order created on behalf of a merchant
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct MerchantOrder {
	pub merchant: User,
	pub order: Order,
	pub external_ip_for_creator: Option<String>,
	pub external_ip_for_payer: Option<String>,
	pub model: Model,
	pub named_model: NamedModel,
	pub owned_model: OwnedModel,
}

/// Service user
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct User {
	pub user_type: Option<String>,
	pub log_status: Option<String>,
	pub integral: Option<String>,
	pub last_seen_at: Option<String>,
	pub model: Model,
	pub named_model: NamedModel,
}

/// Order placed by a user in a given currency
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct UserOrder {
	pub currency: Option<String>,
	pub order: Option<Order>,
	pub model: Model,
	pub named_model: NamedModel,
	pub owned_model: OwnedModel,
}

/// User wallet
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct UserWallet {
	pub status: Option<String>,
	pub user_wallet_type: Option<String>,
	pub acceptable_range: Vec<Value>,
	pub last_used_at: Option<String>,
	pub user_wallet_attributes: Vec<UserWalletAttribute>,
	pub model: Model,
	pub named_model: NamedModel,
	pub owned_model: OwnedModel,
}

/// Key/value attribute attached to a wallet
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct UserWalletAttribute {
	pub key: Option<String>,
	pub value: Option<String>,
	pub model: Model,
	pub owned_model: OwnedModel,
}
