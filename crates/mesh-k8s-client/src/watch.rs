// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

use std::pin::Pin;

use futures::Stream;
use kube::Resource;
use serde::de::DeserializeOwned;
use serde::Deserialize;

use crate::error::{ClientError, ClientResult, Status};

/// A change to a watched collection.
#[derive(Clone, Debug, PartialEq)]
pub enum WatchEvent<K> {
	Added(K),
	Modified(K),
	Deleted(K),
	/// The server has sent every event up to `resource_version`.
	Bookmark { resource_version: String },
}

impl<K: Resource> WatchEvent<K> {
	pub fn object(&self) -> Option<&K> {
		match self {
			WatchEvent::Added(obj) | WatchEvent::Modified(obj) | WatchEvent::Deleted(obj) => Some(obj),
			WatchEvent::Bookmark { .. } => None,
		}
	}

	/// Version to resume a watch from after this event.
	pub fn resource_version(&self) -> Option<&str> {
		match self {
			WatchEvent::Bookmark { resource_version } => Some(resource_version),
			_ => self.object().and_then(|obj| obj.meta().resource_version.as_deref()),
		}
	}
}

/// Events in server emission order. Not restartable: resume by issuing a new
/// watch from the last seen resource version.
pub type WatchStream<K> = Pin<Box<dyn Stream<Item = ClientResult<WatchEvent<K>>> + Send>>;

#[derive(Deserialize)]
#[serde(tag = "type", content = "object", rename_all = "UPPERCASE")]
enum RawEvent<K> {
	Added(K),
	Modified(K),
	Deleted(K),
	Bookmark(BookmarkObject),
	Error(Status),
}

#[derive(Deserialize)]
struct BookmarkObject {
	metadata: BookmarkMeta,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct BookmarkMeta {
	resource_version: String,
}

/// Decode one line of a watch response. Blank keep-alive lines yield `None`.
pub(crate) fn decode_event<K: DeserializeOwned>(line: &str) -> Option<ClientResult<WatchEvent<K>>> {
	if line.trim().is_empty() {
		return None;
	}
	let event = match serde_json::from_str::<RawEvent<K>>(line) {
		Ok(RawEvent::Added(obj)) => Ok(WatchEvent::Added(obj)),
		Ok(RawEvent::Modified(obj)) => Ok(WatchEvent::Modified(obj)),
		Ok(RawEvent::Deleted(obj)) => Ok(WatchEvent::Deleted(obj)),
		Ok(RawEvent::Bookmark(bookmark)) => Ok(WatchEvent::Bookmark {
			resource_version: bookmark.metadata.resource_version,
		}),
		Ok(RawEvent::Error(status)) => Err(ClientError::from(status)),
		Err(err) => Err(ClientError::Decode(err)),
	};
	Some(event)
}
