// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Actions and rules.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::query::{self, Query};
use crate::types::Document;

/// Operations a rule can allow or deny.
///
/// `read`, `update`, `remove` and `all` are aliases covering several
/// concrete actions, see [`Action::includes`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Action {
	/// Reach the service at all.
	Service,
	Create,
	Read,
	Get,
	Find,
	Update,
	Patch,
	Remove,
	Delete,
	All,
}

impl Action {
	pub fn all() -> &'static [Action] {
		&[
			Action::Service,
			Action::Create,
			Action::Read,
			Action::Get,
			Action::Find,
			Action::Update,
			Action::Patch,
			Action::Remove,
			Action::Delete,
			Action::All,
		]
	}

	/// True when a rule written for `self` covers a request for `other`.
	pub fn includes(self, other: Action) -> bool {
		self == other
			|| match self {
				Action::Read => matches!(other, Action::Get | Action::Find),
				Action::Update => other == Action::Patch,
				Action::Remove => other == Action::Delete,
				Action::All => other != Action::Service,
				_ => false,
			}
	}

	pub fn as_str(self) -> &'static str {
		match self {
			Action::Service => "service",
			Action::Create => "create",
			Action::Read => "read",
			Action::Get => "get",
			Action::Find => "find",
			Action::Update => "update",
			Action::Patch => "patch",
			Action::Remove => "remove",
			Action::Delete => "delete",
			Action::All => "all",
		}
	}
}

impl fmt::Display for Action {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		f.write_str(self.as_str())
	}
}

impl FromStr for Action {
	type Err = String;

	fn from_str(s: &str) -> Result<Self, Self::Err> {
		Action::all()
			.iter()
			.copied()
			.find(|action| action.as_str() == s)
			.ok_or_else(|| format!("unknown action: {s}"))
	}
}

/// Anything naming one or more actions.
pub trait IntoActions {
	fn into_actions(self) -> Vec<Action>;
}

impl IntoActions for Action {
	fn into_actions(self) -> Vec<Action> {
		vec![self]
	}
}

impl<const N: usize> IntoActions for [Action; N] {
	fn into_actions(self) -> Vec<Action> {
		self.to_vec()
	}
}

impl IntoActions for &[Action] {
	fn into_actions(self) -> Vec<Action> {
		self.to_vec()
	}
}

impl IntoActions for Vec<Action> {
	fn into_actions(self) -> Vec<Action> {
		self
	}
}

/// A single permission statement.
#[derive(Debug, Clone, PartialEq)]
pub struct Rule {
	pub actions: Vec<Action>,
	/// Resource type (service name) the rule is written for.
	pub subject_type: String,
	/// Equality constraints on the resource; `None` means unconditional.
	pub conditions: Option<Query>,
	/// Deny rule.
	pub inverted: bool,
}

impl Rule {
	pub fn applies_to(&self, action: Action, subject_type: &str) -> bool {
		self.subject_type == subject_type && self.actions.iter().any(|a| a.includes(action))
	}

	/// Evaluates the rule's conditions against a resource payload.
	pub fn matches(&self, payload: &Document) -> bool {
		self.conditions
			.as_ref()
			.map_or(true, |conditions| query::matches(payload, conditions))
	}

	/// Evaluation without an object: conditional deny rules cannot be
	/// decided and are skipped, conditional allow rules count as a match.
	pub fn matches_type(&self) -> bool {
		self.conditions.is_none() || !self.inverted
	}
}
