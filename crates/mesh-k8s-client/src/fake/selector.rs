// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Label and field selector evaluation.

use std::collections::{BTreeMap, BTreeSet};

use serde_json::Value;

use super::route::Query;
use super::store;
use crate::error::Status;

const FIELDS: [&str; 2] = ["metadata.name", "metadata.namespace"];

#[derive(Clone, Debug, PartialEq, Eq)]
enum Requirement {
	Equals(String, String),
	NotEquals(String, String),
	In(String, BTreeSet<String>),
	NotIn(String, BTreeSet<String>),
	Exists(String),
	DoesNotExist(String),
}

impl Requirement {
	fn matches(&self, labels: &BTreeMap<String, String>) -> bool {
		match self {
			Requirement::Equals(k, v) => labels.get(k) == Some(v),
			Requirement::NotEquals(k, v) => labels.get(k) != Some(v),
			Requirement::In(k, values) => labels.get(k).is_some_and(|v| values.contains(v)),
			Requirement::NotIn(k, values) => labels.get(k).map_or(true, |v| !values.contains(v)),
			Requirement::Exists(k) => labels.contains_key(k),
			Requirement::DoesNotExist(k) => !labels.contains_key(k),
		}
	}
}

/// A parsed `labelSelector` query value. The empty selector matches everything.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub(crate) struct LabelSelector {
	requirements: Vec<Requirement>,
}

impl LabelSelector {
	pub(crate) fn parse(input: &str) -> Result<Self, String> {
		let mut requirements = Vec::new();
		if input.trim().is_empty() {
			return Ok(Self { requirements });
		}
		for term in split_terms(input)? {
			requirements.push(parse_requirement(term.trim())?);
		}
		Ok(Self { requirements })
	}

	pub(crate) fn matches(&self, labels: &BTreeMap<String, String>) -> bool {
		self.requirements.iter().all(|r| r.matches(labels))
	}
}

/// Splits on commas outside of `( ... )` value sets.
fn split_terms(input: &str) -> Result<Vec<&str>, String> {
	let mut terms = Vec::new();
	let mut depth = 0usize;
	let mut start = 0;
	for (i, c) in input.char_indices() {
		match c {
			'(' => depth += 1,
			')' => {
				depth = depth
					.checked_sub(1)
					.ok_or_else(|| format!("unbalanced parenthesis in {input:?}"))?;
			}
			',' if depth == 0 => {
				terms.push(&input[start..i]);
				start = i + 1;
			}
			_ => {}
		}
	}
	if depth != 0 {
		return Err(format!("unbalanced parenthesis in {input:?}"));
	}
	terms.push(&input[start..]);
	Ok(terms)
}

fn parse_requirement(term: &str) -> Result<Requirement, String> {
	if term.is_empty() {
		return Err("empty requirement".to_string());
	}

	if let Some(key) = term.strip_prefix('!') {
		return Ok(Requirement::DoesNotExist(label_key(key.trim())?));
	}

	if let Some(open) = term.find('(') {
		let inner = term[open + 1..]
			.strip_suffix(')')
			.ok_or_else(|| format!("expected ')' to close {term:?}"))?;
		let mut head = term[..open].split_whitespace();
		let (Some(key), Some(op), None) = (head.next(), head.next(), head.next()) else {
			return Err(format!("expected \"<key> in|notin (<values>)\", found {term:?}"));
		};
		let key = label_key(key)?;
		let values = inner
			.split(',')
			.map(|v| label_value(v.trim()))
			.collect::<Result<BTreeSet<_>, _>>()?;
		return match op {
			"in" => Ok(Requirement::In(key, values)),
			"notin" => Ok(Requirement::NotIn(key, values)),
			other => Err(format!("unknown set operator {other:?}")),
		};
	}

	if let Some((key, value)) = term.split_once("!=") {
		return Ok(Requirement::NotEquals(label_key(key.trim())?, label_value(value.trim())?));
	}
	if let Some((key, value)) = term.split_once("==").or_else(|| term.split_once('=')) {
		return Ok(Requirement::Equals(label_key(key.trim())?, label_value(value.trim())?));
	}
	Ok(Requirement::Exists(label_key(term)?))
}

fn label_key(key: &str) -> Result<String, String> {
	let (prefix, name) = match key.split_once('/') {
		Some((prefix, name)) => (Some(prefix), name),
		None => (None, key),
	};
	if let Some(prefix) = prefix {
		let ok = !prefix.is_empty()
			&& prefix.len() <= 253
			&& prefix
				.chars()
				.all(|c| c.is_ascii_lowercase() || c.is_ascii_digit() || c == '-' || c == '.');
		if !ok {
			return Err(format!("invalid label key prefix {prefix:?}"));
		}
	}
	if name.is_empty() || !is_label_name(name) {
		return Err(format!("invalid label key {key:?}"));
	}
	Ok(key.to_string())
}

fn label_value(value: &str) -> Result<String, String> {
	if value.is_empty() || is_label_name(value) {
		Ok(value.to_string())
	} else {
		Err(format!("invalid label value {value:?}"))
	}
}

fn is_label_name(s: &str) -> bool {
	let bytes = s.as_bytes();
	bytes.len() <= 63
		&& bytes.first().is_some_and(u8::is_ascii_alphanumeric)
		&& bytes.last().is_some_and(u8::is_ascii_alphanumeric)
		&& bytes
			.iter()
			.all(|b| b.is_ascii_alphanumeric() || matches!(b, b'-' | b'_' | b'.'))
}

/// A parsed `fieldSelector` query value over object metadata.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub(crate) struct FieldSelector {
	terms: Vec<(String, bool, String)>,
}

impl FieldSelector {
	pub(crate) fn parse(input: &str) -> Result<Self, String> {
		let mut terms = Vec::new();
		if input.trim().is_empty() {
			return Ok(Self { terms });
		}
		for term in input.split(',') {
			let (field, equal, value) = if let Some((f, v)) = term.split_once("!=") {
				(f, false, v)
			} else if let Some((f, v)) = term.split_once("==").or_else(|| term.split_once('=')) {
				(f, true, v)
			} else {
				return Err(format!("invalid field selector term {term:?}"));
			};
			let field = field.trim();
			if !FIELDS.contains(&field) {
				return Err(format!(
					"field label not supported: {field:?}, expected one of {FIELDS:?}"
				));
			}
			terms.push((field.to_string(), equal, value.trim().to_string()));
		}
		Ok(Self { terms })
	}

	pub(crate) fn matches(&self, obj: &Value) -> bool {
		self.terms.iter().all(|(field, equal, value)| {
			let actual = match field.as_str() {
				"metadata.name" => store::name(obj),
				_ => store::namespace(obj),
			}
			.unwrap_or_default();
			(actual == value) == *equal
		})
	}
}

/// Which objects of a collection a request addresses.
#[derive(Clone, Debug, Default)]
pub(crate) struct Filter {
	namespace: Option<String>,
	labels: LabelSelector,
	fields: FieldSelector,
}

impl Filter {
	pub(crate) fn from_query(namespace: Option<&str>, query: &Query) -> Result<Self, Status> {
		let labels = LabelSelector::parse(query.get("labelSelector").unwrap_or_default())
			.map_err(|e| Status::failure(400, "BadRequest", format!("unable to parse requirement: {e}")))?;
		let fields = FieldSelector::parse(query.get("fieldSelector").unwrap_or_default())
			.map_err(|e| Status::failure(400, "BadRequest", e))?;
		Ok(Self {
			namespace: namespace.map(str::to_string),
			labels,
			fields,
		})
	}

	pub(crate) fn matches(&self, obj: &Value) -> bool {
		if let Some(ns) = &self.namespace {
			if store::namespace(obj) != Some(ns.as_str()) {
				return false;
			}
		}
		self.labels.matches(&store::labels(obj)) && self.fields.matches(obj)
	}
}
