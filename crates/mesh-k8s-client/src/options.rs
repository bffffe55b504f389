// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Per-verb request options.

use std::fmt;

use serde::Serialize;

/// Options for create requests.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct CreateOptions {
	/// Validate and return the result without persisting it.
	pub dry_run: bool,
	/// Overrides the configured field manager.
	pub field_manager: Option<String>,
}

/// Options for update requests.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct UpdateOptions {
	pub dry_run: bool,
	pub field_manager: Option<String>,
}

/// Options for patch requests.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct PatchOptions {
	pub dry_run: bool,
	pub field_manager: Option<String>,
	/// Take ownership of conflicting fields; only valid for apply patches.
	pub force: Option<bool>,
}

/// Options for get requests.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct GetOptions {
	/// Serve the object at least as new as this version; `"0"` accepts any.
	pub resource_version: Option<String>,
}

impl GetOptions {
	pub fn at_version(resource_version: impl Into<String>) -> Self {
		Self {
			resource_version: Some(resource_version.into()),
		}
	}
}

/// Filtering, pagination and watch options for collection requests.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct ListOptions {
	pub label_selector: Option<String>,
	pub field_selector: Option<String>,
	pub limit: Option<u32>,
	pub continue_token: Option<String>,
	pub resource_version: Option<String>,
	pub resource_version_match: Option<VersionMatch>,
	pub timeout_seconds: Option<u32>,
	/// Ask the server for bookmark events; `None` uses the configured default.
	pub allow_watch_bookmarks: Option<bool>,
}

impl ListOptions {
	pub fn labels(mut self, selector: impl Into<String>) -> Self {
		self.label_selector = Some(selector.into());
		self
	}

	pub fn fields(mut self, selector: impl Into<String>) -> Self {
		self.field_selector = Some(selector.into());
		self
	}

	pub fn limit(mut self, limit: u32) -> Self {
		self.limit = Some(limit);
		self
	}

	pub fn continue_token(mut self, token: impl Into<String>) -> Self {
		self.continue_token = Some(token.into());
		self
	}

	pub fn at_version(mut self, resource_version: impl Into<String>) -> Self {
		self.resource_version = Some(resource_version.into());
		self
	}

	pub fn timeout(mut self, seconds: u32) -> Self {
		self.timeout_seconds = Some(seconds);
		self
	}
}

/// How `resource_version` is interpreted by list requests.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum VersionMatch {
	NotOlderThan,
	Exact,
}

impl VersionMatch {
	pub fn as_str(&self) -> &'static str {
		match self {
			VersionMatch::NotOlderThan => "NotOlderThan",
			VersionMatch::Exact => "Exact",
		}
	}
}

/// Options for delete and delete-collection requests, sent as the request body.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DeleteOptions {
	#[serde(skip_serializing_if = "Option::is_none")]
	pub grace_period_seconds: Option<u32>,
	#[serde(skip_serializing_if = "Option::is_none")]
	pub preconditions: Option<Preconditions>,
	#[serde(skip_serializing_if = "Option::is_none")]
	pub propagation_policy: Option<PropagationPolicy>,
	#[serde(serialize_with = "dry_run_all", skip_serializing_if = "is_false")]
	pub dry_run: bool,
}

/// Conditions the stored object must meet for a delete to proceed.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Preconditions {
	#[serde(skip_serializing_if = "Option::is_none")]
	pub uid: Option<String>,
	#[serde(skip_serializing_if = "Option::is_none")]
	pub resource_version: Option<String>,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
pub enum PropagationPolicy {
	Orphan,
	Background,
	Foreground,
}

fn dry_run_all<S: serde::Serializer>(_: &bool, serializer: S) -> Result<S::Ok, S::Error> {
	serializer.collect_seq(["All"])
}

fn is_false(value: &bool) -> bool {
	!value
}

/// Strategy used to apply a patch payload.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum PatchType {
	/// RFC 6902 JSON patch.
	Json,
	/// RFC 7386 JSON merge patch.
	Merge,
	/// Kubernetes strategic merge patch; only built-in kinds support it.
	StrategicMerge,
	/// Server-side apply.
	Apply,
}

impl PatchType {
	pub fn content_type(&self) -> &'static str {
		match self {
			PatchType::Json => "application/json-patch+json",
			PatchType::Merge => "application/merge-patch+json",
			PatchType::StrategicMerge => "application/strategic-merge-patch+json",
			PatchType::Apply => "application/apply-patch+yaml",
		}
	}

	pub fn from_content_type(content_type: &str) -> Option<Self> {
		let media_type = content_type.split(';').next().unwrap_or_default().trim();
		[
			PatchType::Json,
			PatchType::Merge,
			PatchType::StrategicMerge,
			PatchType::Apply,
		]
		.into_iter()
		.find(|pt| pt.content_type() == media_type)
	}
}

impl fmt::Display for PatchType {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		f.write_str(self.content_type())
	}
}
