//! Core building blocks for the relay.
//!
//! This crate holds everything `relayd` and the probes share: [`Config`]
//! loading, the per-model [`Balancer`] with health tracking, request body
//! transformation for Azure OpenAI, the OpenAI wire types, and a typed
//! [`OpenAiClient`] for talking to an OpenAI-compatible endpoint.

mod balancer;
mod client;
pub mod config;
mod error;
pub mod transform;
pub mod wire;

pub use balancer::{BackendSlot, Balancer, RECOVERY_INTERVAL, RECOVERY_TIMEOUT};
pub use client::{OpenAiClient, TokenStream};
pub use config::{Backend, Config};
pub use error::RelayError;
