// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

use async_trait::async_trait;
use mesh_k8s_client::{ClientResult, Context, GetOptions, PatchOptions, PatchType, ResourceInterface};
use mesh_policy_api::{ProxyProtocol, Server};
use serde_json::json;
use tracing::debug;

use crate::server::Servers;

/// Verbs specific to `Server` objects.
#[async_trait]
pub trait ServerExpansion: Send + Sync {
	/// Like `get`, but a missing object is `Ok(None)`.
	async fn get_opt(&self, ctx: &Context, name: &str) -> ClientResult<Option<Server>>;

	/// Set the proxy protocol hint on an existing server.
	async fn set_proxy_protocol(
		&self,
		ctx: &Context,
		name: &str,
		protocol: ProxyProtocol,
	) -> ClientResult<Server>;
}

#[async_trait]
impl ServerExpansion for Servers {
	async fn get_opt(&self, ctx: &Context, name: &str) -> ClientResult<Option<Server>> {
		match self.get(ctx, name, &GetOptions::default()).await {
			Ok(server) => Ok(Some(server)),
			Err(err) if err.is_not_found() => Ok(None),
			Err(err) => Err(err),
		}
	}

	async fn set_proxy_protocol(
		&self,
		ctx: &Context,
		name: &str,
		protocol: ProxyProtocol,
	) -> ClientResult<Server> {
		debug!(name, ?protocol, namespace = %self.namespace(), "setting proxy protocol");
		let patch = serde_json::to_vec(&json!({ "spec": { "proxyProtocol": protocol } }))?;
		self
			.patch(ctx, name, PatchType::Merge, &patch, &PatchOptions::default(), &[])
			.await
	}
}
