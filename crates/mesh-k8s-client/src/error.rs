// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

use std::fmt;

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Result type alias for resource client operations.
pub type ClientResult<T> = Result<T, ClientError>;

/// Errors returned by resource client operations.
///
/// Failures reported by the API server keep the server's [`Status`] so callers
/// can inspect the reason and message verbatim.
#[derive(Error, Debug)]
pub enum ClientError {
	#[error("not found: {}", .0.message)]
	NotFound(Status),

	#[error("conflict: {}", .0.message)]
	Conflict(Status),

	#[error("invalid: {}", .0.message)]
	Invalid(Status),

	#[error("unsupported patch type: {}", .0.message)]
	UnsupportedPatchType(Status),

	#[error("invalid options: {}", .0.message)]
	InvalidOptions(Status),

	#[error("gone: {}", .0.message)]
	Gone(Status),

	#[error("request cancelled: {0}")]
	Cancelled(CancelReason),

	#[error("{} item(s) failed to delete", .failures.len())]
	DeleteCollection { failures: Vec<ItemFailure> },

	#[error("API error ({}): {}", .0.code, .0.message)]
	Api(Status),

	#[error("transport error: {message}")]
	Transport { message: String },

	#[error("invalid request: {message}")]
	Request { message: String },

	#[error("failed to decode response: {0}")]
	Decode(#[from] serde_json::Error),
}

impl ClientError {
	pub(crate) fn request(message: impl Into<String>) -> Self {
		ClientError::Request {
			message: message.into(),
		}
	}

	/// The server status behind this error, if the server produced one.
	pub fn status(&self) -> Option<&Status> {
		match self {
			ClientError::NotFound(s)
			| ClientError::Conflict(s)
			| ClientError::Invalid(s)
			| ClientError::UnsupportedPatchType(s)
			| ClientError::InvalidOptions(s)
			| ClientError::Gone(s)
			| ClientError::Api(s) => Some(s),
			_ => None,
		}
	}

	pub fn is_not_found(&self) -> bool {
		matches!(self, ClientError::NotFound(_))
	}

	pub fn is_conflict(&self) -> bool {
		matches!(self, ClientError::Conflict(_))
	}

	/// A 409 caused by creating an object whose name is taken.
	pub fn is_already_exists(&self) -> bool {
		matches!(self, ClientError::Conflict(s) if s.reason == "AlreadyExists")
	}

	pub fn is_gone(&self) -> bool {
		matches!(self, ClientError::Gone(_))
	}

	pub fn is_cancelled(&self) -> bool {
		matches!(self, ClientError::Cancelled(_))
	}

	/// Turns a failed delete-collection status into the per-item aggregate.
	///
	/// Statuses without per-item causes are returned unchanged.
	pub(crate) fn into_delete_collection(self) -> Self {
		let causes = self
			.status()
			.and_then(|s| s.details.as_ref())
			.map(|d| d.causes.as_slice())
			.unwrap_or_default();
		if causes.is_empty() {
			return self;
		}

		let failures = causes
			.iter()
			.map(|cause| ItemFailure {
				name: cause.field.clone().unwrap_or_default(),
				reason: cause.reason.clone().unwrap_or_default(),
				message: cause.message.clone().unwrap_or_default(),
			})
			.collect();
		ClientError::DeleteCollection { failures }
	}
}

impl From<Status> for ClientError {
	fn from(status: Status) -> Self {
		match status.code {
			400 => ClientError::InvalidOptions(status),
			404 => ClientError::NotFound(status),
			409 => ClientError::Conflict(status),
			410 => ClientError::Gone(status),
			415 => ClientError::UnsupportedPatchType(status),
			422 => ClientError::Invalid(status),
			_ => ClientError::Api(status),
		}
	}
}

impl From<kube::Error> for ClientError {
	fn from(err: kube::Error) -> Self {
		match err {
			kube::Error::Api(response) => Status {
				status: response.status,
				message: response.message,
				reason: response.reason,
				code: response.code,
				details: None,
			}
			.into(),
			kube::Error::SerdeError(err) => ClientError::Decode(err),
			other => ClientError::Transport {
				message: other.to_string(),
			},
		}
	}
}

/// Why a request scope stopped a call.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum CancelReason {
	Cancelled,
	DeadlineExceeded,
}

impl fmt::Display for CancelReason {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		match self {
			CancelReason::Cancelled => f.write_str("context cancelled"),
			CancelReason::DeadlineExceeded => f.write_str("context deadline exceeded"),
		}
	}
}

/// One item a delete-collection call could not remove.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ItemFailure {
	pub name: String,
	pub reason: String,
	pub message: String,
}

/// Status object returned by the API server for failures.
#[derive(Clone, Debug, Default, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Status {
	#[serde(default)]
	pub status: String,
	#[serde(default)]
	pub message: String,
	#[serde(default)]
	pub reason: String,
	#[serde(default)]
	pub code: u16,
	#[serde(default, skip_serializing_if = "Option::is_none")]
	pub details: Option<StatusDetails>,
}

#[derive(Clone, Debug, Default, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct StatusDetails {
	#[serde(default, skip_serializing_if = "Option::is_none")]
	pub name: Option<String>,
	#[serde(default, skip_serializing_if = "Option::is_none")]
	pub kind: Option<String>,
	#[serde(default, skip_serializing_if = "Vec::is_empty")]
	pub causes: Vec<StatusCause>,
}

#[derive(Clone, Debug, Default, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct StatusCause {
	#[serde(default, rename = "type", skip_serializing_if = "Option::is_none")]
	pub reason: Option<String>,
	#[serde(default, skip_serializing_if = "Option::is_none")]
	pub message: Option<String>,
	#[serde(default, skip_serializing_if = "Option::is_none")]
	pub field: Option<String>,
}

impl Status {
	pub fn failure(code: u16, reason: impl Into<String>, message: impl Into<String>) -> Self {
		Self {
			status: "Failure".to_string(),
			message: message.into(),
			reason: reason.into(),
			code,
			details: None,
		}
	}

	pub fn with_details(mut self, details: StatusDetails) -> Self {
		self.details = Some(details);
		self
	}
}
