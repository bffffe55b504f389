// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Resource types for the mesh policy API group.
//!
//! This crate provides:
//! - The `Server` custom resource (`policy.linkerd.io/v1beta1`)
//! - Its list wrapper, `ServerList`
//! - Label selectors used to bind a `Server` to a set of pods

pub mod labels;
mod server;

pub use labels::{Expression, Operator, Selector};
pub use server::{Port, ProxyProtocol, Server, ServerList, ServerSpec, SERVER_RESOURCE};

pub use k8s_openapi::apimachinery::pkg::apis::meta::v1::{ListMeta, ObjectMeta};
