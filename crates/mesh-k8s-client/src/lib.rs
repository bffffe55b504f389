// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Generic typed client machinery for API server resources.
//!
//! This crate provides:
//! - [`ClientWithList`], a REST engine parameterised by a resource kind and
//!   its list wrapper, implementing the standard verbs of [`ResourceInterface`]
//! - request options and the [`ParameterCodec`] that turns them into query
//!   strings
//! - [`Context`] request scopes with cancellation and deadlines
//! - a classified error taxonomy ([`ClientError`])
//! - the [`Transport`] seam, with [`KubeTransport`] for real clusters
//! - layered client configuration (`MESH_CLIENT_*`)
//! - an in-memory API server for tests (feature `fake`)
//!
//! # Usage
//!
//! ```ignore
//! use mesh_k8s_client::{config, ClientWithList, Context, KubeTransport, RestClient};
//!
//! let config = config::load_config()?;
//! let rest = RestClient::new(Arc::new(KubeTransport::try_default().await?))
//! 	.with_timeout(config.request_timeout);
//! let pods: ClientWithList<Pod, PodList> =
//! 	ClientWithList::new("pods", rest, Arc::new(config.parameter_codec()), "default");
//! let pod = pods.get(&Context::background(), "web-0", &GetOptions::default()).await?;
//! ```

pub mod codec;
pub mod config;
pub mod context;
pub mod error;
#[cfg(any(test, feature = "fake"))]
pub mod fake;
pub mod gentype;
pub mod options;
pub mod request;
pub mod transport;
pub mod watch;

pub use codec::ParameterCodec;
pub use config::ClientConfig;
pub use context::Context;
pub use error::{CancelReason, ClientError, ClientResult, ItemFailure, Status, StatusCause, StatusDetails};
pub use gentype::{ClientWithList, ResourceInterface};
pub use options::{
	CreateOptions, DeleteOptions, GetOptions, ListOptions, PatchOptions, PatchType, Preconditions,
	PropagationPolicy, UpdateOptions, VersionMatch,
};
pub use request::ResourcePath;
pub use transport::{KubeTransport, LineStream, RestClient, Transport};
pub use watch::{WatchEvent, WatchStream};
