// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! JSON merge patch (RFC 7386) and JSON patch (RFC 6902).

use serde_json::{Map, Value};

/// Applies a merge patch in place. `null` members delete keys.
pub(crate) fn merge(target: &mut Value, patch: &Value) {
	let Value::Object(entries) = patch else {
		*target = patch.clone();
		return;
	};
	if !target.is_object() {
		*target = Value::Object(Map::new());
	}
	if let Value::Object(map) = target {
		for (key, value) in entries {
			if value.is_null() {
				map.remove(key);
			} else {
				merge(map.entry(key.clone()).or_insert(Value::Null), value);
			}
		}
	}
}

/// Applies a list of JSON patch operations atomically: on error `doc` is
/// left untouched.
pub(crate) fn apply_json_patch(doc: &mut Value, patch: &Value) -> Result<(), String> {
	let ops = patch
		.as_array()
		.ok_or_else(|| "a json patch must be an array of operations".to_string())?;
	let mut working = doc.clone();
	for op in ops {
		apply_op(&mut working, op)?;
	}
	*doc = working;
	Ok(())
}

fn apply_op(doc: &mut Value, op: &Value) -> Result<(), String> {
	let name = op
		.get("op")
		.and_then(Value::as_str)
		.ok_or_else(|| "operation is missing \"op\"".to_string())?;
	let path = pointer(op, "path")?;

	match name {
		"add" => add(doc, &path, value(op)?),
		"remove" => remove(doc, &path).map(drop),
		"replace" => {
			let value = value(op)?;
			if path.is_empty() {
				*doc = value;
				return Ok(());
			}
			remove(doc, &path)?;
			add(doc, &path, value)
		}
		"move" => {
			let from = pointer(op, "from")?;
			if path.len() > from.len() && path[..from.len()] == from[..] {
				return Err("cannot move a value into one of its children".to_string());
			}
			let moved = remove(doc, &from)?;
			add(doc, &path, moved)
		}
		"copy" => {
			let from = pointer(op, "from")?;
			let copied = get(doc, &from)?.clone();
			add(doc, &path, copied)
		}
		"test" => {
			if *get(doc, &path)? == value(op)? {
				Ok(())
			} else {
				Err(format!("test failed at /{}", path.join("/")))
			}
		}
		other => Err(format!("unknown operation {other:?}")),
	}
}

fn value(op: &Value) -> Result<Value, String> {
	op.get("value")
		.cloned()
		.ok_or_else(|| "operation is missing \"value\"".to_string())
}

fn pointer(op: &Value, member: &str) -> Result<Vec<String>, String> {
	let raw = op
		.get(member)
		.and_then(Value::as_str)
		.ok_or_else(|| format!("operation is missing {member:?}"))?;
	if raw.is_empty() {
		return Ok(Vec::new());
	}
	let rest = raw
		.strip_prefix('/')
		.ok_or_else(|| format!("invalid pointer {raw:?}"))?;
	Ok(rest
		.split('/')
		.map(|token| token.replace("~1", "/").replace("~0", "~"))
		.collect())
}

fn index(token: &str, len: usize) -> Result<usize, String> {
	let valid = !token.is_empty()
		&& token.bytes().all(|b| b.is_ascii_digit())
		&& (token == "0" || !token.starts_with('0'));
	let idx = valid
		.then(|| token.parse::<usize>().ok())
		.flatten()
		.ok_or_else(|| format!("invalid array index {token:?}"))?;
	if idx > len {
		return Err(format!("array index {idx} out of bounds"));
	}
	Ok(idx)
}

fn get<'a>(doc: &'a Value, path: &[String]) -> Result<&'a Value, String> {
	path.iter().try_fold(doc, |node, token| match node {
		Value::Object(map) => map.get(token).ok_or_else(|| format!("missing key {token:?}")),
		Value::Array(items) => {
			let idx = index(token, items.len())?;
			items.get(idx).ok_or_else(|| format!("array index {idx} out of bounds"))
		}
		_ => Err(format!("cannot traverse into a scalar at {token:?}")),
	})
}

fn get_mut<'a>(doc: &'a mut Value, path: &[String]) -> Result<&'a mut Value, String> {
	path.iter().try_fold(doc, |node, token| match node {
		Value::Object(map) => map.get_mut(token).ok_or_else(|| format!("missing key {token:?}")),
		Value::Array(items) => {
			let idx = index(token, items.len())?;
			items
				.get_mut(idx)
				.ok_or_else(|| format!("array index {idx} out of bounds"))
		}
		_ => Err(format!("cannot traverse into a scalar at {token:?}")),
	})
}

fn add(doc: &mut Value, path: &[String], value: Value) -> Result<(), String> {
	let Some((last, parent)) = path.split_last() else {
		*doc = value;
		return Ok(());
	};
	match get_mut(doc, parent)? {
		Value::Object(map) => {
			map.insert(last.clone(), value);
			Ok(())
		}
		Value::Array(items) if last == "-" => {
			items.push(value);
			Ok(())
		}
		Value::Array(items) => {
			let idx = index(last, items.len())?;
			items.insert(idx, value);
			Ok(())
		}
		_ => Err(format!("cannot add a member to a scalar at {last:?}")),
	}
}

fn remove(doc: &mut Value, path: &[String]) -> Result<Value, String> {
	let (last, parent) = path
		.split_last()
		.ok_or_else(|| "cannot remove the document root".to_string())?;
	match get_mut(doc, parent)? {
		Value::Object(map) => map.remove(last).ok_or_else(|| format!("missing key {last:?}")),
		Value::Array(items) => {
			let idx = index(last, items.len())?;
			if idx >= items.len() {
				return Err(format!("array index {idx} out of bounds"));
			}
			Ok(items.remove(idx))
		}
		_ => Err(format!("cannot remove a member of a scalar at {last:?}")),
	}
}
