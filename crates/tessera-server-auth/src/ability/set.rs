// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Ability sets and the builder hooks write rules into.
//!
//! Rules are evaluated newest-first: the most recently added rule that
//! applies to the action and resource type, and matches the resource, decides
//! the outcome. A later `cannot` therefore overrides an earlier `can` and a
//! later `can` re-opens access an earlier `cannot` closed.

use std::sync::Arc;

use serde_json::{json, Value};
use tracing::warn;

use super::types::{Action, IntoActions, Rule};
use crate::query::{self, Query};
use crate::types::{Document, DocumentId, TypedResource};

/// Field that scopes rules to a service context; never stored on documents.
pub const CONTEXT_FIELD: &str = "context";

/// Collects rules contributed by ability hooks.
#[derive(Debug, Default)]
pub struct AbilityBuilder {
	rules: Vec<Rule>,
}

impl AbilityBuilder {
	pub fn new() -> Self {
		Self::default()
	}

	pub fn can(&mut self, actions: impl IntoActions, subject_type: &str) -> &mut Self {
		self.push(actions, subject_type, None, false)
	}

	/// Allow rule restricted to resources matching `conditions`.
	///
	/// `conditions` must be a JSON object; anything else drops the rule.
	pub fn can_if(
		&mut self,
		actions: impl IntoActions,
		subject_type: &str,
		conditions: Value,
	) -> &mut Self {
		match query::from_value(conditions) {
			Some(conditions) => self.push(actions, subject_type, Some(conditions), false),
			None => {
				warn!(subject_type, "ignoring allow rule with non-object conditions");
				self
			}
		}
	}

	pub fn cannot(&mut self, actions: impl IntoActions, subject_type: &str) -> &mut Self {
		self.push(actions, subject_type, None, true)
	}

	/// Deny rule restricted to resources matching `conditions`.
	///
	/// Non-object conditions turn into an unconditional deny.
	pub fn cannot_if(
		&mut self,
		actions: impl IntoActions,
		subject_type: &str,
		conditions: Value,
	) -> &mut Self {
		let conditions = query::from_value(conditions);
		if conditions.is_none() {
			warn!(subject_type, "deny rule with non-object conditions applies unconditionally");
		}
		self.push(actions, subject_type, conditions, true)
	}

	fn push(
		&mut self,
		actions: impl IntoActions,
		subject_type: &str,
		conditions: Option<Query>,
		inverted: bool,
	) -> &mut Self {
		self.rules.push(Rule {
			actions: actions.into_actions(),
			subject_type: subject_type.to_string(),
			conditions,
			inverted,
		});
		self
	}

	pub fn rules(&self) -> &[Rule] {
		&self.rules
	}

	pub fn build(self) -> AbilitySet {
		AbilitySet::new(self.rules)
	}
}

/// Immutable snapshot of a subject's rules.
///
/// Cloning shares the underlying rules.
#[derive(Debug, Clone, Default)]
pub struct AbilitySet {
	rules: Arc<[Rule]>,
}

impl AbilitySet {
	pub fn new(rules: Vec<Rule>) -> Self {
		Self {
			rules: rules.into(),
		}
	}

	pub fn rules(&self) -> &[Rule] {
		&self.rules
	}

	pub fn is_empty(&self) -> bool {
		self.rules.is_empty()
	}

	/// True when both handles share the same rules.
	pub fn ptr_eq(&self, other: &AbilitySet) -> bool {
		Arc::ptr_eq(&self.rules, &other.rules)
	}

	/// Rules for `action` on `subject_type`, newest first.
	pub fn relevant_rules<'a>(
		&'a self,
		action: Action,
		subject_type: &'a str,
	) -> impl Iterator<Item = &'a Rule> + 'a {
		self.rules
			.iter()
			.rev()
			.filter(move |rule| rule.applies_to(action, subject_type))
	}

	/// Type-level check, used for service access.
	pub fn can_type(&self, action: Action, subject_type: &str) -> bool {
		self.relevant_rules(action, subject_type)
			.find(|rule| rule.matches_type())
			.is_some_and(|rule| !rule.inverted)
	}

	pub fn can_service(&self, path: &str) -> bool {
		self.can_type(Action::Service, path)
	}

	/// Object-level check of `resource` as an instance of `resource_type`.
	///
	/// A service `context` is added to the evaluated payload so rules can be
	/// scoped to it; a missing resource is evaluated as an empty object.
	pub fn can(
		&self,
		action: Action,
		resource_type: &str,
		context: Option<&DocumentId>,
		resource: Option<&Document>,
	) -> bool {
		self.can_resource(action, &TypedResource::new(resource_type, resource, context))
	}

	pub fn can_resource(&self, action: Action, resource: &TypedResource) -> bool {
		self.relevant_rules(action, &resource.resource_type)
			.find(|rule| rule.matches(&resource.payload))
			.is_some_and(|rule| !rule.inverted)
	}

	/// Query selecting the resources of `resource_type` this set allows
	/// `action` on.
	///
	/// `None` means no resource is accessible; an empty query means no
	/// restriction. Context constraints are removed since the context is not
	/// a stored field.
	pub fn filter_query_for(&self, action: Action, resource_type: &str) -> Option<Query> {
		self.filter_query(action, resource_type, None)
	}

	/// Like [`filter_query_for`](Self::filter_query_for), for the service of
	/// `context`.
	///
	/// Rules whose top-level `context` constraint rejects `context` are left
	/// out, so a rule scoped to one context never narrows another.
	pub fn filter_query_in(
		&self,
		action: Action,
		resource_type: &str,
		context: Option<&DocumentId>,
	) -> Option<Query> {
		self.filter_query(action, resource_type, context)
	}

	fn filter_query(
		&self,
		action: Action,
		resource_type: &str,
		context: Option<&DocumentId>,
	) -> Option<Query> {
		let mut allowed = Vec::new();
		let mut denied = Vec::new();
		let mut unrestricted = false;

		for rule in self.relevant_rules(action, resource_type) {
			if let (Some(conditions), Some(context)) = (&rule.conditions, context) {
				if !admits_context(conditions, context) {
					continue;
				}
			}
			match (&rule.conditions, rule.inverted) {
				(None, true) => break,
				(None, false) => {
					unrestricted = true;
					break;
				}
				(Some(conditions), false) => allowed.push(Value::Object(conditions.clone())),
				(Some(conditions), true) => denied.push(json!({ "$nor": [conditions] })),
			}
		}

		if !unrestricted && allowed.is_empty() {
			return None;
		}

		let mut filter = Query::new();
		if !unrestricted {
			filter.insert("$or".to_string(), Value::Array(allowed));
		}
		if !denied.is_empty() {
			filter.insert("$and".to_string(), Value::Array(denied));
		}

		query::strip_field(&mut filter, CONTEXT_FIELD).then_some(filter)
	}
}

/// Whether the top-level `context` constraint of `conditions`, if any,
/// accepts `context`.
fn admits_context(conditions: &Document, context: &DocumentId) -> bool {
	let Some(condition) = conditions.get(CONTEXT_FIELD) else {
		return true;
	};
	let mut payload = Document::new();
	payload.insert(CONTEXT_FIELD.to_string(), context.clone().into());
	let mut constraint = Query::new();
	constraint.insert(CONTEXT_FIELD.to_string(), condition.clone());
	query::matches(&payload, &constraint)
}
