// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Query-string encoding for request options.

use url::form_urlencoded::Serializer;

use crate::config::ClientConfig;
use crate::options::{CreateOptions, GetOptions, ListOptions, PatchOptions, PatchType, UpdateOptions};

/// Encodes request options into API server query parameters.
///
/// Built once from a [`ClientConfig`] and shared by every accessor; values the
/// caller leaves unset fall back to the configured defaults.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct ParameterCodec {
	field_manager: Option<String>,
	watch_timeout_secs: Option<u64>,
	allow_watch_bookmarks: bool,
}

impl ParameterCodec {
	pub fn new(config: &ClientConfig) -> Self {
		Self {
			field_manager: config.field_manager.clone(),
			watch_timeout_secs: config.watch_timeout.map(|t| t.as_secs()),
			allow_watch_bookmarks: config.allow_watch_bookmarks,
		}
	}

	pub fn encode_create(&self, opts: &CreateOptions) -> String {
		let mut query = Serializer::new(String::new());
		self.write_common(&mut query, opts.dry_run, opts.field_manager.as_deref());
		query.finish()
	}

	pub fn encode_update(&self, opts: &UpdateOptions) -> String {
		let mut query = Serializer::new(String::new());
		self.write_common(&mut query, opts.dry_run, opts.field_manager.as_deref());
		query.finish()
	}

	pub fn encode_patch(&self, patch_type: PatchType, opts: &PatchOptions) -> String {
		let mut query = Serializer::new(String::new());
		self.write_common(&mut query, opts.dry_run, opts.field_manager.as_deref());
		if let Some(force) = opts.force {
			query.append_pair("force", bool_str(force));
		} else if patch_type == PatchType::Apply {
			query.append_pair("force", "false");
		}
		query.finish()
	}

	pub fn encode_get(&self, opts: &GetOptions) -> String {
		let mut query = Serializer::new(String::new());
		if let Some(rv) = &opts.resource_version {
			query.append_pair("resourceVersion", rv);
		}
		query.finish()
	}

	pub fn encode_list(&self, opts: &ListOptions) -> String {
		let mut query = Serializer::new(String::new());
		write_list(&mut query, opts);
		if let Some(timeout) = opts.timeout_seconds {
			query.append_pair("timeoutSeconds", &timeout.to_string());
		}
		query.finish()
	}

	pub fn encode_watch(&self, opts: &ListOptions) -> String {
		let mut query = Serializer::new(String::new());
		query.append_pair("watch", "true");
		write_list(&mut query, opts);

		let timeout = opts
			.timeout_seconds
			.map(u64::from)
			.or(self.watch_timeout_secs);
		if let Some(timeout) = timeout {
			query.append_pair("timeoutSeconds", &timeout.to_string());
		}

		let bookmarks = opts
			.allow_watch_bookmarks
			.unwrap_or(self.allow_watch_bookmarks);
		if bookmarks {
			query.append_pair("allowWatchBookmarks", "true");
		}
		query.finish()
	}

	fn write_common(&self, query: &mut Serializer<'_, String>, dry_run: bool, field_manager: Option<&str>) {
		if dry_run {
			query.append_pair("dryRun", "All");
		}
		if let Some(manager) = field_manager.or(self.field_manager.as_deref()) {
			query.append_pair("fieldManager", manager);
		}
	}
}

fn write_list(query: &mut Serializer<'_, String>, opts: &ListOptions) {
	if let Some(selector) = &opts.label_selector {
		query.append_pair("labelSelector", selector);
	}
	if let Some(selector) = &opts.field_selector {
		query.append_pair("fieldSelector", selector);
	}
	if let Some(limit) = opts.limit {
		query.append_pair("limit", &limit.to_string());
	}
	if let Some(token) = &opts.continue_token {
		query.append_pair("continue", token);
	}
	if let Some(rv) = &opts.resource_version {
		query.append_pair("resourceVersion", rv);
	}
	if let Some(version_match) = opts.resource_version_match {
		query.append_pair("resourceVersionMatch", version_match.as_str());
	}
}

fn bool_str(value: bool) -> &'static str {
	if value {
		"true"
	} else {
		"false"
	}
}
