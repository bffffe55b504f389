// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! URL paths and HTTP requests for a resource collection.

use http::header::{ACCEPT, CONTENT_TYPE};
use http::{Method, Request};

use crate::error::{ClientError, ClientResult};

pub(crate) const JSON: &str = "application/json";

/// Where a resource kind lives in the API server's URL space.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ResourcePath {
	group: String,
	version: String,
	plural: String,
}

impl ResourcePath {
	pub fn new(group: impl Into<String>, version: impl Into<String>, plural: impl Into<String>) -> Self {
		Self {
			group: group.into(),
			version: version.into(),
			plural: plural.into(),
		}
	}

	pub fn plural(&self) -> &str {
		&self.plural
	}

	/// `/apis/{group}/{version}`, or `/api/{version}` for the core group.
	pub fn prefix(&self) -> String {
		if self.group.is_empty() {
			format!("/api/{}", self.version)
		} else {
			format!("/apis/{}/{}", self.group, self.version)
		}
	}

	/// Collection path, optionally inside a namespace.
	pub fn collection(&self, namespace: Option<&str>) -> String {
		match namespace {
			Some(ns) => format!("{}/namespaces/{}/{}", self.prefix(), ns, self.plural),
			None => format!("{}/{}", self.prefix(), self.plural),
		}
	}

	/// Path of a single object and, optionally, one of its sub-resources.
	pub fn item(&self, namespace: Option<&str>, name: &str, subresources: &[&str]) -> ClientResult<String> {
		validate_segment("resource name", name)?;
		let mut path = format!("{}/{}", self.collection(namespace), name);
		for sub in subresources {
			validate_segment("subresource", sub)?;
			path.push('/');
			path.push_str(sub);
		}
		Ok(path)
	}
}

/// Rejects values that would change the meaning of the URL path.
pub(crate) fn validate_segment(what: &str, segment: &str) -> ClientResult<()> {
	if segment.is_empty() {
		return Err(ClientError::request(format!("{what} may not be empty")));
	}
	if segment == "." || segment == ".." {
		return Err(ClientError::request(format!("{what} may not be '{segment}'")));
	}
	if segment.contains('/') || segment.contains('%') {
		return Err(ClientError::request(format!(
			"invalid {what} {segment:?}: may not contain '/' or '%'"
		)));
	}
	Ok(())
}

pub(crate) fn build(
	method: Method,
	path: &str,
	query: &str,
	content_type: Option<&str>,
	body: Vec<u8>,
) -> ClientResult<Request<Vec<u8>>> {
	let uri = if query.is_empty() {
		path.to_string()
	} else {
		format!("{path}?{query}")
	};

	let mut builder = Request::builder()
		.method(method)
		.uri(uri)
		.header(ACCEPT, JSON);
	if let Some(content_type) = content_type {
		builder = builder.header(CONTENT_TYPE, content_type);
	}
	builder
		.body(body)
		.map_err(|e| ClientError::request(e.to_string()))
}
