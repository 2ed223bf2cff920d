// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Document query language.
//!
//! Queries are JSON objects in the usual document-store dialect: each key is a
//! dotted field path matched by equality (array fields match when any element
//! is equal) or an operator object (`$in`, `$nin`, `$ne`, `$eq`, `$gt`, `$gte`,
//! `$lt`, `$lte`, `$exists`). Top-level `$or`, `$and` and `$nor` combine
//! sub-queries. Keys starting with `$` that are not operators (`$limit`,
//! `$skip`, `$sort`, `$select`) are paging controls and never filter.
//!
//! The same evaluator backs rule conditions and the document services, so a
//! filter derived from abilities selects exactly the documents the abilities
//! allow.

use std::cmp::Ordering;

use serde_json::{Map, Value};

use crate::types::Document;

pub type Query = Map<String, Value>;

const PAGING_KEYS: &[&str] = &["$limit", "$skip", "$sort", "$select"];

/// Converts a JSON value to a query; anything but an object yields `None`.
pub fn from_value(value: Value) -> Option<Query> {
	match value {
		Value::Object(map) => Some(map),
		_ => None,
	}
}

/// True when `doc` satisfies every clause of `query`.
pub fn matches(doc: &Document, query: &Query) -> bool {
	query.iter().all(|(key, condition)| match key.as_str() {
		"$or" => branches(condition).any(|branch| matches(doc, branch)),
		"$and" => branches(condition).all(|branch| matches(doc, branch)),
		"$nor" => !branches(condition).any(|branch| matches(doc, branch)),
		k if PAGING_KEYS.contains(&k) => true,
		path => matches_field(&resolve(doc, path), condition),
	})
}

fn branches(condition: &Value) -> impl Iterator<Item = &Query> {
	condition
		.as_array()
		.into_iter()
		.flatten()
		.filter_map(Value::as_object)
}

/// Candidate values for a dotted path; arrays along the path fan out and an
/// array leaf contributes both itself and its elements.
fn resolve<'a>(doc: &'a Document, path: &str) -> Vec<&'a Value> {
	let segments: Vec<&str> = path.split('.').collect();
	let mut out = Vec::new();
	if let Some((head, rest)) = segments.split_first() {
		if let Some(value) = doc.get(*head) {
			collect(value, rest, &mut out);
		}
	}
	out
}

fn collect<'a>(value: &'a Value, segments: &[&str], out: &mut Vec<&'a Value>) {
	match segments.split_first() {
		None => {
			out.push(value);
			if let Value::Array(items) = value {
				out.extend(items.iter());
			}
		}
		Some((head, rest)) => match value {
			Value::Object(map) => {
				if let Some(next) = map.get(*head) {
					collect(next, rest, out);
				}
			}
			Value::Array(items) => match head.parse::<usize>() {
				Ok(index) => {
					if let Some(item) = items.get(index) {
						collect(item, rest, out);
					}
				}
				Err(_) => {
					for item in items {
						collect(item, segments, out);
					}
				}
			},
			_ => {}
		},
	}
}

fn is_operator_object(condition: &Value) -> Option<&Map<String, Value>> {
	condition
		.as_object()
		.filter(|map| !map.is_empty() && map.keys().all(|k| k.starts_with('$')))
}

fn matches_field(candidates: &[&Value], condition: &Value) -> bool {
	match is_operator_object(condition) {
		Some(operators) => operators
			.iter()
			.all(|(op, operand)| matches_operator(candidates, op, operand)),
		None => equals_any(candidates, condition),
	}
}

fn equals_any(candidates: &[&Value], expected: &Value) -> bool {
	if candidates.is_empty() {
		return expected.is_null();
	}
	candidates.iter().any(|candidate| values_equal(candidate, expected))
}

fn values_equal(a: &Value, b: &Value) -> bool {
	match (a, b) {
		(Value::Number(x), Value::Number(y)) => x.as_f64() == y.as_f64(),
		_ => a == b,
	}
}

fn compare(a: &Value, b: &Value) -> Option<Ordering> {
	match (a, b) {
		(Value::Number(x), Value::Number(y)) => x.as_f64()?.partial_cmp(&y.as_f64()?),
		(Value::String(x), Value::String(y)) => Some(x.cmp(y)),
		_ => None,
	}
}

fn matches_operator(candidates: &[&Value], op: &str, operand: &Value) -> bool {
	match op {
		"$eq" => equals_any(candidates, operand),
		"$ne" => !equals_any(candidates, operand),
		"$in" => operand
			.as_array()
			.is_some_and(|options| options.iter().any(|option| equals_any(candidates, option))),
		"$nin" => operand
			.as_array()
			.map_or(true, |options| !options.iter().any(|option| equals_any(candidates, option))),
		"$gt" => ordered(candidates, operand, |o| o == Ordering::Greater),
		"$gte" => ordered(candidates, operand, |o| o != Ordering::Less),
		"$lt" => ordered(candidates, operand, |o| o == Ordering::Less),
		"$lte" => ordered(candidates, operand, |o| o != Ordering::Greater),
		"$exists" => operand.as_bool().unwrap_or(true) != candidates.is_empty(),
		// Unknown operators never match.
		_ => false,
	}
}

fn ordered(candidates: &[&Value], operand: &Value, accept: impl Fn(Ordering) -> bool) -> bool {
	candidates
		.iter()
		.any(|candidate| compare(candidate, operand).is_some_and(&accept))
}

// =============================================================================
// Rewriting
// =============================================================================

/// Removes `field` from `query` at every depth.
///
/// Returns `false` when the rewritten query can match nothing, which happens
/// when a `$nor` branch (or an `$and` branch) is left with no constraint.
/// `$or` branches left empty make the disjunction always true, so the `$or`
/// is dropped; empty `$and` branches are dropped; array elements emptied by
/// the removal are dropped, then arrays and objects emptied by it.
pub fn strip_field(query: &mut Query, field: &str) -> bool {
	query.remove(field);

	let mut satisfiable = true;
	let keys: Vec<String> = query.keys().cloned().collect();
	for key in keys {
		let Some(value) = query.get_mut(&key) else {
			continue;
		};

		let clause = match key.as_str() {
			"$or" => strip_or(value, field),
			"$and" => strip_and(value, field),
			"$nor" => strip_nor(value, field),
			_ => {
				if strip_nested(value, field) {
					Clause::Keep
				} else {
					Clause::Drop
				}
			}
		};

		let keep = match clause {
			Clause::Keep => true,
			Clause::Drop => false,
			Clause::Unsatisfiable => {
				satisfiable = false;
				true
			}
		};

		if !keep {
			query.remove(&key);
		}
	}

	satisfiable
}

enum Clause {
	Keep,
	Drop,
	Unsatisfiable,
}

fn strip_or(value: &mut Value, field: &str) -> Clause {
	let Value::Array(items) = value else {
		return Clause::Keep;
	};
	let mut tautology = false;
	items.retain_mut(|item| match item {
		Value::Object(branch) => {
			if !strip_field(branch, field) {
				return false;
			}
			if branch.is_empty() {
				tautology = true;
			}
			true
		}
		_ => true,
	});
	if tautology {
		Clause::Drop
	} else if items.is_empty() {
		Clause::Unsatisfiable
	} else {
		Clause::Keep
	}
}

fn strip_and(value: &mut Value, field: &str) -> Clause {
	let Value::Array(items) = value else {
		return Clause::Keep;
	};
	let mut unsatisfiable = false;
	items.retain_mut(|item| match item {
		Value::Object(branch) => {
			if !strip_field(branch, field) {
				unsatisfiable = true;
			}
			!branch.is_empty()
		}
		_ => true,
	});
	if unsatisfiable {
		Clause::Unsatisfiable
	} else if items.is_empty() {
		Clause::Drop
	} else {
		Clause::Keep
	}
}

fn strip_nor(value: &mut Value, field: &str) -> Clause {
	let Value::Array(items) = value else {
		return Clause::Keep;
	};
	let mut contradiction = false;
	// A branch that can no longer match is a no-op inside `$nor`.
	items.retain_mut(|item| match item {
		Value::Object(branch) => {
			if !strip_field(branch, field) {
				return false;
			}
			if branch.is_empty() {
				contradiction = true;
			}
			true
		}
		_ => true,
	});
	if contradiction {
		Clause::Unsatisfiable
	} else if items.is_empty() {
		Clause::Drop
	} else {
		Clause::Keep
	}
}

/// Strips inside a field condition; returns whether the key should stay.
fn strip_nested(value: &mut Value, field: &str) -> bool {
	match value {
		Value::Object(map) => {
			if map.is_empty() {
				return true;
			}
			strip_object(map, field);
			!map.is_empty()
		}
		Value::Array(items) => {
			if items.is_empty() {
				return true;
			}
			items.retain_mut(|item| match item {
				Value::Object(map) if !map.is_empty() => {
					strip_object(map, field);
					!map.is_empty()
				}
				_ => true,
			});
			!items.is_empty()
		}
		_ => true,
	}
}

fn strip_object(map: &mut Map<String, Value>, field: &str) {
	map.remove(field);
	let keys: Vec<String> = map.keys().cloned().collect();
	for key in keys {
		if let Some(value) = map.get_mut(&key) {
			if !strip_nested(value, field) {
				map.remove(&key);
			}
		}
	}
}

/// Adds `restriction` to `query` as a conjunction.
///
/// Keys absent from `query` are copied over. Keys present in both are moved
/// into an `$and` clause so neither side's constraint is lost.
pub fn restrict(query: &mut Query, restriction: Query) {
	let mut conflicts = Query::new();
	let mut clauses = Vec::new();
	for (key, value) in restriction {
		if key == "$and" {
			match value {
				Value::Array(items) => clauses.extend(items),
				other => clauses.push(other),
			}
		} else if query.contains_key(&key) {
			conflicts.insert(key, value);
		} else {
			query.insert(key, value);
		}
	}
	if !conflicts.is_empty() {
		clauses.push(Value::Object(conflicts));
	}
	if clauses.is_empty() {
		return;
	}

	let mut existing = match query.remove("$and") {
		Some(Value::Array(items)) => items,
		Some(other) => vec![other],
		None => Vec::new(),
	};
	existing.extend(clauses);
	query.insert("$and".to_string(), Value::Array(existing));
}
