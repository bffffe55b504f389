// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Typed client for `policy.linkerd.io/v1beta1` resources.
//!
//! [`ServerV1beta1Client`] is the group client. It hands out per-namespace
//! [`Servers`] accessors that expose the standard verbs through
//! [`ResourceInterface`](mesh_k8s_client::ResourceInterface) and the
//! kind-specific ones through [`ServerExpansion`].
//!
//! ```ignore
//! use mesh_k8s_client::{config, Context, GetOptions};
//! use mesh_policy_client::{ServerInterface, ServerV1beta1Client, ServersGetter};
//!
//! let config = config::load_config()?;
//! let client = ServerV1beta1Client::try_default(&config).await?;
//! let servers = client.servers("emojivoto");
//! let web = servers.get(&Context::background(), "web-http", &GetOptions::default()).await?;
//! ```

mod client;
mod expansion;
mod server;

pub use client::ServerV1beta1Client;
pub use expansion::ServerExpansion;
pub use server::{ServerInterface, Servers, ServersGetter};
