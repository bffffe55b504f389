// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Request path and query parsing, plus the status objects the fake server
//! answers with.

use std::collections::HashMap;

use crate::error::{Status, StatusDetails};

/// A parsed resource URL.
#[derive(Clone, Debug, PartialEq, Eq)]
pub(crate) struct Route {
	pub group: String,
	pub version: String,
	pub plural: String,
	pub namespace: Option<String>,
	pub name: Option<String>,
	pub subresources: Vec<String>,
}

impl Route {
	pub(crate) fn parse(path: &str) -> Result<Self, Status> {
		let segments: Vec<&str> = path.trim_matches('/').split('/').collect();
		if segments.iter().any(|s| s.is_empty()) {
			return Err(unknown_path(path));
		}

		let (group, version, rest) = match segments.as_slice() {
			["api", version, rest @ ..] => ("", *version, rest),
			["apis", group, version, rest @ ..] => (*group, *version, rest),
			_ => return Err(unknown_path(path)),
		};

		let (namespace, rest) = match rest {
			["namespaces", ns, rest @ ..] if !rest.is_empty() => (Some(ns.to_string()), rest),
			_ => (None, rest),
		};

		let [plural, tail @ ..] = rest else {
			return Err(unknown_path(path));
		};
		let (name, subresources) = match tail {
			[] => (None, Vec::new()),
			[name, subs @ ..] => (Some(name.to_string()), subs.iter().map(|s| s.to_string()).collect()),
		};

		Ok(Self {
			group: group.to_string(),
			version: version.to_string(),
			plural: plural.to_string(),
			namespace,
			name,
			subresources,
		})
	}

	/// Storage key shared by every namespace of this collection.
	pub(crate) fn collection(&self) -> String {
		if self.group.is_empty() {
			format!("/api/{}/{}", self.version, self.plural)
		} else {
			format!("/apis/{}/{}/{}", self.group, self.version, self.plural)
		}
	}

	pub(crate) fn api_version(&self) -> String {
		if self.group.is_empty() {
			self.version.clone()
		} else {
			format!("{}/{}", self.group, self.version)
		}
	}

	/// Custom resources live outside the core group.
	pub(crate) fn is_custom(&self) -> bool {
		!self.group.is_empty()
	}

	/// `servers.policy.linkerd.io` style name used in messages.
	pub(crate) fn qualified(&self) -> String {
		if self.group.is_empty() {
			self.plural.clone()
		} else {
			format!("{}.{}", self.plural, self.group)
		}
	}

	fn details(&self, name: &str) -> StatusDetails {
		StatusDetails {
			name: Some(name.to_string()),
			kind: Some(self.plural.clone()),
			causes: Vec::new(),
		}
	}

	pub(crate) fn not_found(&self, name: &str) -> Status {
		Status::failure(404, "NotFound", format!("{} {name:?} not found", self.qualified()))
			.with_details(self.details(name))
	}

	pub(crate) fn already_exists(&self, name: &str) -> Status {
		Status::failure(409, "AlreadyExists", format!("{} {name:?} already exists", self.qualified()))
			.with_details(self.details(name))
	}

	pub(crate) fn conflict(&self, name: &str, message: &str) -> Status {
		Status::failure(
			409,
			"Conflict",
			format!("Operation cannot be fulfilled on {} {name:?}: {message}", self.qualified()),
		)
		.with_details(self.details(name))
	}

	pub(crate) fn invalid(&self, name: &str, message: &str) -> Status {
		Status::failure(422, "Invalid", format!("{} {name:?} is invalid: {message}", self.qualified()))
			.with_details(self.details(name))
	}
}

pub(crate) fn unknown_path(path: &str) -> Status {
	Status::failure(
		404,
		"NotFound",
		format!("the server could not find the requested resource ({path})"),
	)
}

pub(crate) fn bad_request(message: impl Into<String>) -> Status {
	Status::failure(400, "BadRequest", message)
}

pub(crate) fn expired(message: impl Into<String>) -> Status {
	Status::failure(410, "Expired", message)
}

pub(crate) fn unsupported_media_type(content_type: &str) -> Status {
	Status::failure(
		415,
		"UnsupportedMediaType",
		format!(
			"the body of the request was in an unknown format - accepted media types include: \
			 application/json-patch+json, application/merge-patch+json, application/apply-patch+yaml \
			 (got {content_type:?})"
		),
	)
}

/// Decoded query string.
#[derive(Clone, Debug, Default)]
pub(crate) struct Query(HashMap<String, String>);

impl Query {
	pub(crate) fn parse(query: Option<&str>) -> Self {
		Self(
			url::form_urlencoded::parse(query.unwrap_or_default().as_bytes())
				.into_owned()
				.collect(),
		)
	}

	/// A parameter's value; empty values count as absent.
	pub(crate) fn get(&self, key: &str) -> Option<&str> {
		self.0.get(key).map(String::as_str).filter(|v| !v.is_empty())
	}

	pub(crate) fn flag(&self, key: &str) -> bool {
		self.get(key) == Some("true")
	}

	pub(crate) fn dry_run(&self) -> bool {
		self.get("dryRun") == Some("All")
	}

	pub(crate) fn number(&self, key: &str) -> Result<Option<u64>, Status> {
		self.get(key)
			.map(|raw| {
				raw.parse()
					.map_err(|_| bad_request(format!("invalid value {raw:?} for {key}")))
			})
			.transpose()
	}
}
