// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Client configuration.
//!
//! Layered from built-in defaults, a TOML file (`/etc/mesh/client.toml`) and
//! `MESH_CLIENT_*` environment variables, then resolved into an immutable
//! [`ClientConfig`] that is handed to each accessor at construction time.

pub mod error;
pub mod layer;
pub mod sources;

use std::time::Duration;

use tracing::{debug, info};

pub use error::ConfigError;
pub use layer::{ClientConfigLayer, DEFAULT_FIELD_MANAGER, DEFAULT_REQUEST_TIMEOUT_SECS};
pub use sources::{ConfigSource, DefaultsSource, EnvSource, Precedence, TomlSource};

use crate::codec::ParameterCodec;

/// Fully resolved client configuration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClientConfig {
	/// Field manager recorded for writes that do not name one.
	pub field_manager: Option<String>,
	/// Bound for unary calls whose context has no deadline.
	pub request_timeout: Option<Duration>,
	/// Server-side timeout requested for watches.
	pub watch_timeout: Option<Duration>,
	pub allow_watch_bookmarks: bool,
}

impl Default for ClientConfig {
	fn default() -> Self {
		Self {
			field_manager: Some(DEFAULT_FIELD_MANAGER.to_string()),
			request_timeout: Some(Duration::from_secs(DEFAULT_REQUEST_TIMEOUT_SECS)),
			watch_timeout: None,
			allow_watch_bookmarks: true,
		}
	}
}

impl ClientConfig {
	pub fn parameter_codec(&self) -> ParameterCodec {
		ParameterCodec::new(self)
	}
}

/// Load configuration from all sources with standard precedence.
///
/// Precedence (highest to lowest):
/// 1. Environment variables (`MESH_CLIENT_*`)
/// 2. Config file (`/etc/mesh/client.toml`)
/// 3. Built-in defaults
pub fn load_config() -> Result<ClientConfig, ConfigError> {
	load_from(vec![
		Box::new(DefaultsSource),
		Box::new(TomlSource::system()),
		Box::new(EnvSource::new()),
	])
}

/// Merge `sources` in precedence order and resolve the result.
pub fn load_from(mut sources: Vec<Box<dyn ConfigSource>>) -> Result<ClientConfig, ConfigError> {
	sources.sort_by_key(|s| s.precedence());

	let mut merged = ClientConfigLayer::default();
	for source in sources {
		debug!(source = source.name(), "loading configuration source");
		let layer = source.load()?;
		merged.merge(layer);
	}

	let config = merged.resolve()?;
	info!(
		field_manager = ?config.field_manager,
		request_timeout = ?config.request_timeout,
		watch_timeout = ?config.watch_timeout,
		"client configuration loaded"
	);
	Ok(config)
}
