// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Versioned object storage with a bounded change history.

use std::collections::{BTreeMap, VecDeque};

use serde_json::{Map, Value};

/// Default number of changes kept for watch replay.
pub const DEFAULT_HISTORY_LIMIT: usize = 1_000;

#[derive(Clone, Debug, PartialEq, Eq, PartialOrd, Ord)]
pub(crate) struct ObjectKey {
	pub resource: String,
	pub namespace: String,
	pub name: String,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub(crate) enum ChangeKind {
	Added,
	Modified,
	Deleted,
	Bookmark,
}

/// One committed write, as delivered to watchers.
#[derive(Clone, Debug)]
pub(crate) struct Change {
	pub kind: ChangeKind,
	/// Collection path; empty for bookmarks, which go to every watcher.
	pub resource: String,
	pub resource_version: u64,
	pub object: Value,
	/// State before a modification, used for selector transitions.
	pub previous: Option<Value>,
}

impl Change {
	pub(crate) fn bookmark(resource_version: u64) -> Self {
		Self {
			kind: ChangeKind::Bookmark,
			resource: String::new(),
			resource_version,
			object: Value::Null,
			previous: None,
		}
	}
}

/// Position in a paginated list: the snapshot version and the last key served.
#[derive(Clone, Debug, PartialEq, Eq)]
pub(crate) struct ContinueToken {
	pub snapshot: u64,
	pub namespace: String,
	pub name: String,
}

impl ContinueToken {
	pub(crate) fn encode(&self) -> String {
		format!("{}:{}/{}", self.snapshot, self.namespace, self.name)
	}

	pub(crate) fn decode(token: &str) -> Option<Self> {
		let (snapshot, key) = token.split_once(':')?;
		let (namespace, name) = key.split_once('/')?;
		if name.is_empty() {
			return None;
		}
		Some(Self {
			snapshot: snapshot.parse().ok()?,
			namespace: namespace.to_string(),
			name: name.to_string(),
		})
	}
}

pub(crate) struct Store {
	objects: BTreeMap<ObjectKey, Value>,
	resource_version: u64,
	history: VecDeque<Change>,
	history_limit: usize,
	/// Versions at or below this can no longer be replayed.
	compacted: u64,
}

impl Store {
	pub(crate) fn new(history_limit: usize) -> Self {
		Self {
			objects: BTreeMap::new(),
			resource_version: 0,
			history: VecDeque::with_capacity(history_limit.min(DEFAULT_HISTORY_LIMIT)),
			history_limit,
			compacted: 0,
		}
	}

	pub(crate) fn current(&self) -> u64 {
		self.resource_version
	}

	pub(crate) fn compacted(&self) -> u64 {
		self.compacted
	}

	pub(crate) fn next_version(&mut self) -> u64 {
		self.resource_version += 1;
		self.resource_version
	}

	pub(crate) fn get(&self, key: &ObjectKey) -> Option<&Value> {
		self.objects.get(key)
	}

	/// Objects of `resource`, ordered by namespace then name.
	pub(crate) fn scan(
		&self,
		resource: &str,
		namespace: Option<&str>,
	) -> impl Iterator<Item = (&ObjectKey, &Value)> {
		let resource = resource.to_string();
		let namespace = namespace.map(str::to_string);
		self.objects.iter().filter(move |(key, _)| {
			key.resource == resource && namespace.as_ref().map_or(true, |ns| key.namespace == *ns)
		})
	}

	/// Stores `object` (already stamped with `resource_version`) and records
	/// the change.
	pub(crate) fn put(&mut self, key: ObjectKey, object: Value, previous: Option<Value>) -> Change {
		let change = Change {
			kind: if previous.is_some() {
				ChangeKind::Modified
			} else {
				ChangeKind::Added
			},
			resource: key.resource.clone(),
			resource_version: self.resource_version,
			object: object.clone(),
			previous,
		};
		self.objects.insert(key, object);
		self.record(change.clone());
		change
	}

	/// Removes the object under `key`; `tombstone` is its final state.
	pub(crate) fn delete(&mut self, key: &ObjectKey, tombstone: Value) -> Change {
		self.objects.remove(key);
		let change = Change {
			kind: ChangeKind::Deleted,
			resource: key.resource.clone(),
			resource_version: self.resource_version,
			object: tombstone,
			previous: None,
		};
		self.record(change.clone());
		change
	}

	fn record(&mut self, change: Change) {
		if self.history.len() >= self.history_limit {
			if let Some(dropped) = self.history.pop_front() {
				self.compacted = dropped.resource_version;
			}
		}
		self.history.push_back(change);
	}

	/// Forgets all history up to the current version.
	pub(crate) fn compact(&mut self) {
		self.history.clear();
		self.compacted = self.resource_version;
	}

	/// Changes committed after `resource_version`, oldest first.
	pub(crate) fn history_since(&self, resource_version: u64) -> impl Iterator<Item = &Change> {
		self.history
			.iter()
			.filter(move |c| c.resource_version > resource_version)
	}
}

pub(crate) fn metadata(obj: &Value) -> Option<&Map<String, Value>> {
	obj.get("metadata").and_then(Value::as_object)
}

/// The object's metadata map, created if absent.
pub(crate) fn metadata_mut(obj: &mut Value) -> &mut Map<String, Value> {
	let root = object_mut(obj);
	object_mut(root.entry("metadata").or_insert(Value::Null))
}

fn object_mut(value: &mut Value) -> &mut Map<String, Value> {
	if !value.is_object() {
		*value = Value::Object(Map::new());
	}
	match value {
		Value::Object(map) => map,
		_ => unreachable!(),
	}
}

fn meta_str<'a>(obj: &'a Value, key: &str) -> Option<&'a str> {
	metadata(obj)?
		.get(key)
		.and_then(Value::as_str)
		.filter(|s| !s.is_empty())
}

pub(crate) fn name(obj: &Value) -> Option<&str> {
	meta_str(obj, "name")
}

pub(crate) fn namespace(obj: &Value) -> Option<&str> {
	meta_str(obj, "namespace")
}

pub(crate) fn generate_name(obj: &Value) -> Option<&str> {
	meta_str(obj, "generateName")
}

pub(crate) fn uid(obj: &Value) -> Option<&str> {
	meta_str(obj, "uid")
}

pub(crate) fn resource_version(obj: &Value) -> Option<&str> {
	meta_str(obj, "resourceVersion")
}

pub(crate) fn generation(obj: &Value) -> i64 {
	metadata(obj)
		.and_then(|m| m.get("generation"))
		.and_then(Value::as_i64)
		.unwrap_or(0)
}

pub(crate) fn labels(obj: &Value) -> BTreeMap<String, String> {
	metadata(obj)
		.and_then(|m| m.get("labels"))
		.and_then(Value::as_object)
		.map(|labels| {
			labels
				.iter()
				.filter_map(|(k, v)| Some((k.clone(), v.as_str()?.to_string())))
				.collect()
		})
		.unwrap_or_default()
}

#[cfg(test)]
mod tests {
	use super::*;
	use serde_json::json;

	fn key(ns: &str, name: &str) -> ObjectKey {
		ObjectKey {
			resource: "/apis/g/v1/things".to_string(),
			namespace: ns.to_string(),
			name: name.to_string(),
		}
	}

	fn stamped(store: &mut Store, name: &str) -> Value {
		let rv = store.next_version();
		json!({"metadata": {"name": name, "resourceVersion": rv.to_string()}})
	}

	#[test]
	fn scan_is_ordered_and_scoped() {
		let mut store = Store::new(10);
		for (ns, name) in [("b", "x"), ("a", "z"), ("a", "y")] {
			let obj = stamped(&mut store, name);
			store.put(key(ns, name), obj, None);
		}
		let names: Vec<_> = store.scan("/apis/g/v1/things", None).map(|(k, _)| k.name.as_str()).collect();
		assert_eq!(names, ["y", "z", "x"]);
		assert_eq!(store.scan("/apis/g/v1/things", Some("b")).count(), 1);
		assert_eq!(store.scan("/apis/g/v1/others", None).count(), 0);
	}

	#[test]
	fn history_is_bounded_and_advances_the_watermark() {
		let mut store = Store::new(2);
		for name in ["a", "b", "c"] {
			let obj = stamped(&mut store, name);
			store.put(key("ns", name), obj, None);
		}
		assert_eq!(store.compacted(), 1);
		let versions: Vec<_> = store.history_since(0).map(|c| c.resource_version).collect();
		assert_eq!(versions, [2, 3]);

		store.compact();
		assert_eq!(store.compacted(), 3);
		assert_eq!(store.history_since(0).count(), 0);
	}

	#[test]
	fn put_records_modifications_with_previous_state() {
		let mut store = Store::new(10);
		let first = stamped(&mut store, "a");
		store.put(key("ns", "a"), first.clone(), None);
		let second = stamped(&mut store, "a");
		let change = store.put(key("ns", "a"), second, Some(first.clone()));
		assert_eq!(change.kind, ChangeKind::Modified);
		assert_eq!(change.previous, Some(first));
		assert_eq!(change.resource_version, 2);

		let tombstone = stamped(&mut store, "a");
		let change = store.delete(&key("ns", "a"), tombstone);
		assert_eq!(change.kind, ChangeKind::Deleted);
		assert!(store.get(&key("ns", "a")).is_none());
	}

	#[test]
	fn continue_tokens() {
		let token = ContinueToken {
			snapshot: 7,
			namespace: "ns1".to_string(),
			name: "web".to_string(),
		};
		assert_eq!(ContinueToken::decode(&token.encode()), Some(token));
		assert_eq!(ContinueToken::decode("garbage"), None);
		assert_eq!(ContinueToken::decode("x:ns/web"), None);
		assert_eq!(ContinueToken::decode("3:ns/"), None);
	}

	#[test]
	fn metadata_helpers() {
		let mut obj = json!({"metadata": {"name": "web", "labels": {"app": "web", "n": 1}}});
		assert_eq!(name(&obj), Some("web"));
		assert_eq!(namespace(&obj), None);
		assert_eq!(labels(&obj).len(), 1);
		assert_eq!(generation(&obj), 0);

		let mut bare = json!(null);
		metadata_mut(&mut bare).insert("name".to_string(), json!("x"));
		assert_eq!(name(&bare), Some("x"));
		metadata_mut(&mut obj).insert("generation".to_string(), json!(2));
		assert_eq!(generation(&obj), 2);
	}
}
