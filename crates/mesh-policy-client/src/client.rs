// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

use std::sync::Arc;

use mesh_k8s_client::{
	ClientConfig, ClientResult, ClientWithList, KubeTransport, ParameterCodec, RestClient, Transport,
};
use mesh_policy_api::SERVER_RESOURCE;
use tracing::debug;

use crate::server::{Servers, ServersGetter};

/// Client for the `policy.linkerd.io/v1beta1` API group.
///
/// The parameter codec is built once from the [`ClientConfig`] given at
/// construction and shared, read-only, by every accessor this client creates.
#[derive(Clone, Debug)]
pub struct ServerV1beta1Client {
	rest: RestClient,
	codec: Arc<ParameterCodec>,
}

impl ServerV1beta1Client {
	pub fn new(client: kube::Client, config: &ClientConfig) -> Self {
		Self::with_transport(Arc::new(KubeTransport::new(client)), config)
	}

	/// Create a client from the ambient cluster configuration.
	pub async fn try_default(config: &ClientConfig) -> ClientResult<Self> {
		let transport = KubeTransport::try_default().await?;
		Ok(Self::with_transport(Arc::new(transport), config))
	}

	/// Create a client over any transport, such as an in-memory API server.
	pub fn with_transport(transport: Arc<dyn Transport>, config: &ClientConfig) -> Self {
		debug!(
			field_manager = ?config.field_manager,
			request_timeout = ?config.request_timeout,
			"policy client initialized"
		);
		Self {
			rest: RestClient::new(transport).with_timeout(config.request_timeout),
			codec: Arc::new(config.parameter_codec()),
		}
	}

	/// The REST client shared by this client's accessors.
	pub fn rest_client(&self) -> &RestClient {
		&self.rest
	}
}

impl ServersGetter for ServerV1beta1Client {
	fn servers(&self, namespace: &str) -> Servers {
		ClientWithList::new(SERVER_RESOURCE, self.rest.clone(), self.codec.clone(), namespace)
	}
}
