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

//! Mangrove SDK - Client library for the order/payment service
//!
//! This crate provides request signing for outbound calls, signature
//! verification for inbound order callbacks, a typed client for the service
//! endpoints, and the shared entity structures.
//!
//! The SDK is designed to be lightweight and embeddable:
//! - No background threads
//! - No global state; configuration is passed in explicitly
//! - No environment or configuration loading

pub mod canonical;
pub mod client;
pub mod signing;
pub mod types;
pub mod verify;

pub use client::{Client, ClientConfig, ClientError, SyncClient};
pub use signing::{Credential, RequestSigner, SignedHeaders, SigningError, SigningHeaders};
pub use types::*;
pub use verify::{CallbackRequest, CallbackVerifier, VerificationError, VerifiedPayload};
