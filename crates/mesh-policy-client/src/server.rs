// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

use mesh_k8s_client::{ClientWithList, ResourceInterface};
use mesh_policy_api::{Server, ServerList};

use crate::expansion::ServerExpansion;

/// Accessor for `Server` objects in one namespace.
pub type Servers = ClientWithList<Server, ServerList>;

/// Has a method to return a [`Servers`] accessor.
pub trait ServersGetter {
	/// Accessor bound to `namespace`; the empty namespace lists and watches
	/// across all namespaces.
	fn servers(&self, namespace: &str) -> Servers;
}

/// Every operation available on `Server` objects: the standard verbs plus the
/// kind-specific extensions.
pub trait ServerInterface: ResourceInterface<Server, ServerList> + ServerExpansion {}

impl<T> ServerInterface for T where T: ResourceInterface<Server, ServerList> + ServerExpansion {}
