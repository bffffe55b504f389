// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Label selectors as they appear in resource specs.

use std::collections::BTreeMap;

use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

/// Selects objects by their labels.
///
/// An empty selector matches everything; all terms must hold for a match.
#[derive(Clone, Debug, Default, PartialEq, Eq, Deserialize, Serialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct Selector {
	#[serde(default, skip_serializing_if = "Option::is_none")]
	pub match_labels: Option<BTreeMap<String, String>>,
	#[serde(default, skip_serializing_if = "Option::is_none")]
	pub match_expressions: Option<Vec<Expression>>,
}

#[derive(Clone, Debug, PartialEq, Eq, Deserialize, Serialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct Expression {
	pub key: String,
	pub operator: Operator,
	#[serde(default, skip_serializing_if = "Option::is_none")]
	pub values: Option<Vec<String>>,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Deserialize, Serialize, JsonSchema)]
pub enum Operator {
	In,
	NotIn,
	Exists,
	DoesNotExist,
}

impl Selector {
	pub fn from_labels<K, V>(labels: impl IntoIterator<Item = (K, V)>) -> Self
	where
		K: Into<String>,
		V: Into<String>,
	{
		Self {
			match_labels: Some(
				labels
					.into_iter()
					.map(|(k, v)| (k.into(), v.into()))
					.collect(),
			),
			match_expressions: None,
		}
	}

	pub fn with_expression(mut self, expression: Expression) -> Self {
		self.match_expressions
			.get_or_insert_with(Vec::new)
			.push(expression);
		self
	}

	pub fn matches(&self, labels: &BTreeMap<String, String>) -> bool {
		let labels_match = self
			.match_labels
			.iter()
			.flatten()
			.all(|(k, v)| labels.get(k) == Some(v));

		labels_match
			&& self
				.match_expressions
				.iter()
				.flatten()
				.all(|expr| expr.matches(labels))
	}
}

impl Expression {
	pub fn new(key: impl Into<String>, operator: Operator, values: Vec<String>) -> Self {
		Self {
			key: key.into(),
			operator,
			values: if values.is_empty() { None } else { Some(values) },
		}
	}

	fn matches(&self, labels: &BTreeMap<String, String>) -> bool {
		let values = self.values.as_deref().unwrap_or_default();
		match (self.operator, labels.get(&self.key)) {
			(Operator::In, Some(v)) => values.contains(v),
			(Operator::In, None) => false,
			(Operator::NotIn, Some(v)) => !values.contains(v),
			(Operator::NotIn, None) => true,
			(Operator::Exists, found) => found.is_some(),
			(Operator::DoesNotExist, found) => found.is_none(),
		}
	}
}
