// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Mergeable configuration layer.

use std::time::Duration;

use serde::{Deserialize, Serialize};

use super::error::ConfigError;
use super::ClientConfig;

pub const DEFAULT_FIELD_MANAGER: &str = "mesh-policy-client";
pub const DEFAULT_REQUEST_TIMEOUT_SECS: u64 = 30;
const MAX_FIELD_MANAGER_LEN: usize = 128;

/// Client configuration layer (for merging).
///
/// All fields are optional to support layered configuration from
/// multiple sources (defaults, files, environment).
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ClientConfigLayer {
	pub field_manager: Option<String>,
	/// `0` disables the client-side timeout.
	pub request_timeout_secs: Option<u64>,
	pub watch_timeout_secs: Option<u64>,
	pub allow_watch_bookmarks: Option<bool>,
}

impl ClientConfigLayer {
	/// Merges another layer on top of this one.
	/// Values from `other` take precedence when present.
	pub fn merge(&mut self, other: ClientConfigLayer) {
		if other.field_manager.is_some() {
			self.field_manager = other.field_manager;
		}
		if other.request_timeout_secs.is_some() {
			self.request_timeout_secs = other.request_timeout_secs;
		}
		if other.watch_timeout_secs.is_some() {
			self.watch_timeout_secs = other.watch_timeout_secs;
		}
		if other.allow_watch_bookmarks.is_some() {
			self.allow_watch_bookmarks = other.allow_watch_bookmarks;
		}
	}

	/// Resolves this layer into a runtime configuration.
	pub fn resolve(self) -> Result<ClientConfig, ConfigError> {
		let field_manager = self
			.field_manager
			.unwrap_or_else(|| DEFAULT_FIELD_MANAGER.to_string());
		validate_field_manager(&field_manager)?;

		if self.watch_timeout_secs == Some(0) {
			return Err(ConfigError::Validation(
				"watch_timeout_secs must be greater than zero".to_string(),
			));
		}

		let request_timeout = match self.request_timeout_secs.unwrap_or(DEFAULT_REQUEST_TIMEOUT_SECS) {
			0 => None,
			secs => Some(Duration::from_secs(secs)),
		};

		Ok(ClientConfig {
			field_manager: Some(field_manager),
			request_timeout,
			watch_timeout: self.watch_timeout_secs.map(Duration::from_secs),
			allow_watch_bookmarks: self.allow_watch_bookmarks.unwrap_or(true),
		})
	}
}

fn validate_field_manager(manager: &str) -> Result<(), ConfigError> {
	if manager.is_empty() {
		return Err(ConfigError::Validation("field_manager may not be empty".to_string()));
	}
	if manager.len() > MAX_FIELD_MANAGER_LEN {
		return Err(ConfigError::Validation(format!(
			"field_manager may not exceed {MAX_FIELD_MANAGER_LEN} characters"
		)));
	}
	if !manager.chars().all(|c| c.is_ascii_graphic() || c == ' ') {
		return Err(ConfigError::Validation(
			"field_manager must be printable ASCII".to_string(),
		));
	}
	Ok(())
}

#[cfg(test)]
mod tests {
	use super::*;
	use proptest::prelude::*;

	#[test]
	fn defaults_resolve() {
		let config = ClientConfigLayer::default().resolve().unwrap();
		assert_eq!(config.field_manager.as_deref(), Some(DEFAULT_FIELD_MANAGER));
		assert_eq!(config.request_timeout, Some(Duration::from_secs(30)));
		assert_eq!(config.watch_timeout, None);
		assert!(config.allow_watch_bookmarks);
		assert_eq!(config, ClientConfig::default());
	}

	#[test]
	fn merge_prefers_present_values() {
		let mut base = ClientConfigLayer {
			field_manager: Some("base".to_string()),
			request_timeout_secs: Some(10),
			..Default::default()
		};
		base.merge(ClientConfigLayer {
			request_timeout_secs: Some(20),
			allow_watch_bookmarks: Some(false),
			..Default::default()
		});

		assert_eq!(base.field_manager.as_deref(), Some("base"));
		assert_eq!(base.request_timeout_secs, Some(20));
		assert_eq!(base.allow_watch_bookmarks, Some(false));
	}

	#[test]
	fn zero_request_timeout_disables_it() {
		let config = ClientConfigLayer {
			request_timeout_secs: Some(0),
			..Default::default()
		}
		.resolve()
		.unwrap();
		assert_eq!(config.request_timeout, None);
	}

	#[test]
	fn rejects_zero_watch_timeout() {
		let err = ClientConfigLayer {
			watch_timeout_secs: Some(0),
			..Default::default()
		}
		.resolve()
		.unwrap_err();
		assert!(matches!(err, ConfigError::Validation(_)));
	}

	#[test]
	fn rejects_bad_field_managers() {
		for manager in [String::new(), "x".repeat(129), "bad\nname".to_string()] {
			let layer = ClientConfigLayer {
				field_manager: Some(manager),
				..Default::default()
			};
			assert!(layer.resolve().is_err());
		}
	}

	proptest! {
		#[test]
		fn printable_field_managers_are_accepted(manager in "[ -~]{1,128}") {
			let layer = ClientConfigLayer {
				field_manager: Some(manager.clone()),
				..Default::default()
			};
			let config = layer.resolve().unwrap();
			prop_assert_eq!(config.field_manager, Some(manager));
		}
	}
}
