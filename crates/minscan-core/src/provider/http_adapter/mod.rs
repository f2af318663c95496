//! Native JSON-RPC client for Ethereum-compatible endpoints.
//!
//! Implements [`ChainProvider`](super::ChainProvider) over JSON-RPC using
//! `reqwest`, with API-key-in-path authentication, optional request rate
//! limiting, and single and batched calls.

mod client;
mod connection;
mod parsing;
mod protocol;

pub use client::{HttpProvider, HttpProviderConfig};
