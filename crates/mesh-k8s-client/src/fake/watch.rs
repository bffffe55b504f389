// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Watch event projection and line streams.

use std::time::Duration;

use futures::{future, stream, StreamExt};
use serde_json::{json, Value};
use tokio::sync::broadcast;
use tokio_stream::wrappers::errors::BroadcastStreamRecvError;
use tokio_stream::wrappers::BroadcastStream;

use super::route::{expired, Query, Route};
use super::selector::Filter;
use super::store::{Change, ChangeKind};
use crate::error::{ClientError, Status};
use crate::transport::LineStream;

/// One watch request's view of the change feed.
pub(crate) struct Watcher {
	pub collection: String,
	api_version: String,
	filter: Filter,
	bookmarks: bool,
}

impl Watcher {
	pub(crate) fn new(route: &Route, query: &Query) -> Result<Self, Status> {
		Ok(Self {
			collection: route.collection(),
			api_version: route.api_version(),
			filter: Filter::from_query(route.namespace.as_deref(), query)?,
			bookmarks: query.flag("allowWatchBookmarks"),
		})
	}

	/// Synthetic `ADDED` line for an object that exists when the watch opens.
	pub(crate) fn added(&self, obj: &Value) -> Option<String> {
		self.filter.matches(obj).then(|| event_line("ADDED", obj))
	}

	/// The line this watcher sees for `change`, if any.
	///
	/// A modification that moves an object into the selection is reported as
	/// `ADDED`, and one that moves it out as `DELETED`.
	pub(crate) fn project(&self, change: &Change) -> Option<String> {
		if change.kind == ChangeKind::Bookmark {
			return self.bookmarks.then(|| {
				event_line(
					"BOOKMARK",
					&json!({
						"apiVersion": self.api_version,
						"metadata": { "resourceVersion": change.resource_version.to_string() },
					}),
				)
			});
		}
		if change.resource != self.collection {
			return None;
		}

		let now = self.filter.matches(&change.object);
		let kind = match change.kind {
			ChangeKind::Added if now => "ADDED",
			ChangeKind::Deleted if now => "DELETED",
			ChangeKind::Modified => {
				let before = change
					.previous
					.as_ref()
					.is_some_and(|prev| self.filter.matches(prev));
				match (before, now) {
					(true, true) => "MODIFIED",
					(false, true) => "ADDED",
					(true, false) => "DELETED",
					(false, false) => return None,
				}
			}
			_ => return None,
		};
		Some(event_line(kind, &change.object))
	}
}

fn event_line(kind: &str, object: &Value) -> String {
	json!({ "type": kind, "object": object }).to_string()
}

fn error_line(status: &Status) -> String {
	let mut object = json!(status);
	object["kind"] = json!("Status");
	object["apiVersion"] = json!("v1");
	event_line("ERROR", &object)
}

/// A watch that reports `status` and ends.
pub(crate) fn closed(status: Status) -> LineStream {
	Box::pin(stream::iter([Ok::<_, ClientError>(error_line(&status))]))
}

/// Replays `initial`, then follows `receiver` until the server-side timeout.
///
/// A watcher that falls too far behind is sent a `410 Expired` error and
/// closed.
pub(crate) fn stream(
	initial: Vec<String>,
	receiver: broadcast::Receiver<Change>,
	watcher: Watcher,
	timeout: Option<Duration>,
) -> LineStream {
	let live = BroadcastStream::new(receiver)
		.scan(false, move |lagged, item| {
			if *lagged {
				return future::ready(None);
			}
			let line = match item {
				Ok(change) => watcher.project(&change),
				Err(BroadcastStreamRecvError::Lagged(missed)) => {
					*lagged = true;
					Some(error_line(&expired(format!(
						"watch fell behind by {missed} events and was closed"
					))))
				}
			};
			future::ready(Some(line))
		})
		.filter_map(future::ready);

	let lines = stream::iter(initial).chain(live).map(Ok::<_, ClientError>);
	match timeout {
		Some(timeout) => Box::pin(lines.take_until(tokio::time::sleep(timeout))),
		None => Box::pin(lines),
	}
}

#[cfg(test)]
mod tests {
	use super::*;

	fn watcher(query: &str) -> Watcher {
		let route = Route::parse("/apis/g/v1/namespaces/ns1/things").unwrap();
		Watcher::new(&route, &Query::parse(Some(query))).unwrap()
	}

	fn thing(app: &str) -> Value {
		json!({"metadata": {"name": "a", "namespace": "ns1", "labels": {"app": app}}})
	}

	fn change(kind: ChangeKind, object: Value, previous: Option<Value>) -> Change {
		Change {
			kind,
			resource: "/apis/g/v1/things".to_string(),
			resource_version: 9,
			object,
			previous,
		}
	}

	fn event_type(line: &str) -> String {
		let value: Value = serde_json::from_str(line).unwrap();
		value["type"].as_str().unwrap().to_string()
	}

	#[test]
	fn selector_transitions() {
		let w = watcher("labelSelector=app%3Dweb");
		let project = |prev: &str, now: &str| {
			w.project(&change(ChangeKind::Modified, thing(now), Some(thing(prev))))
				.map(|line| event_type(&line))
		};
		assert_eq!(project("web", "web").as_deref(), Some("MODIFIED"));
		assert_eq!(project("api", "web").as_deref(), Some("ADDED"));
		assert_eq!(project("web", "api").as_deref(), Some("DELETED"));
		assert_eq!(project("api", "api"), None);
	}

	#[test]
	fn other_collections_and_namespaces_are_ignored() {
		let w = watcher("");
		let mut other = change(ChangeKind::Added, thing("web"), None);
		other.resource = "/apis/g/v1/others".to_string();
		assert!(w.project(&other).is_none());

		let mut elsewhere = thing("web");
		elsewhere["metadata"]["namespace"] = json!("ns2");
		assert!(w.project(&change(ChangeKind::Added, elsewhere, None)).is_none());
	}

	#[test]
	fn bookmarks_need_opting_in() {
		assert!(watcher("").project(&Change::bookmark(4)).is_none());
		let line = watcher("allowWatchBookmarks=true")
			.project(&Change::bookmark(4))
			.unwrap();
		let value: Value = serde_json::from_str(&line).unwrap();
		assert_eq!(value["type"], "BOOKMARK");
		assert_eq!(value["object"]["metadata"]["resourceVersion"], "4");
	}

	#[tokio::test]
	async fn stream_replays_then_follows() {
		let (tx, rx) = broadcast::channel(8);
		let w = watcher("");
		let initial = vec![w.added(&thing("web")).unwrap()];
		let mut lines = stream(initial, rx, w, None);

		tx.send(change(ChangeKind::Deleted, thing("web"), None)).unwrap();
		drop(tx);

		assert_eq!(event_type(&lines.next().await.unwrap().unwrap()), "ADDED");
		assert_eq!(event_type(&lines.next().await.unwrap().unwrap()), "DELETED");
		assert!(lines.next().await.is_none());
	}

	#[tokio::test]
	async fn lagging_watchers_are_expired() {
		let (tx, rx) = broadcast::channel(1);
		let mut lines = stream(Vec::new(), rx, watcher(""), None);
		for _ in 0..3 {
			tx.send(change(ChangeKind::Added, thing("web"), None)).unwrap();
		}

		let line = lines.next().await.unwrap().unwrap();
		let value: Value = serde_json::from_str(&line).unwrap();
		assert_eq!(value["type"], "ERROR");
		assert_eq!(value["object"]["code"], 410);
		assert!(lines.next().await.is_none());
	}

	#[tokio::test(start_paused = true)]
	async fn server_timeout_ends_the_stream() {
		let (_tx, rx) = broadcast::channel(1);
		let mut lines = stream(Vec::new(), rx, watcher(""), Some(Duration::from_secs(5)));
		assert!(lines.next().await.is_none());
	}

	#[tokio::test]
	async fn closed_stream_reports_status() {
		let mut lines = closed(expired("too old resource version: 1 (5)"));
		let line = lines.next().await.unwrap().unwrap();
		assert!(line.contains("\"Expired\""));
		assert!(lines.next().await.is_none());
	}
}
