// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Abilities derived from a subject's scope entries.
//!
//! | Role      | Resource          | Authorisations on the resource |
//! |-----------|-------------------|--------------------------------|
//! | `member`  | read              | -                              |
//! | `manager` | read, update      | create, remove                 |
//! | `owner`   | read, update, remove | create, remove              |

use serde_json::json;

use crate::ability::{AbilityBuilder, AbilityHook, Action};
use crate::types::{Role, ScopeEntry, Subject};

/// Writes the rules granted by one scope entry on `resource_service`.
///
/// Entries with an unknown role grant nothing.
pub fn define_resource_rules(
	entry: &ScopeEntry,
	resource_service: &str,
	authorisations_service: &str,
	builder: &mut AbilityBuilder,
) {
	let Some(role) = entry.role() else {
		return;
	};
	let id = json!({ "_id": entry.id });

	if role.has_permission_of(&Role::Member) {
		builder.can_if(Action::Read, resource_service, id.clone());
	}
	if role.has_permission_of(&Role::Manager) {
		builder.can_if(Action::Update, resource_service, id.clone());
		builder.can_if(
			[Action::Create, Action::Remove],
			authorisations_service,
			json!({ "resource": entry.id }),
		);
	}
	if role.has_permission_of(&Role::Owner) {
		builder.can_if(Action::Remove, resource_service, id);
	}
}

/// Hook granting resource rules for every entry of one scope list.
#[derive(Debug, Clone)]
pub struct ScopeAbilities {
	/// Scope list read from the subject, e.g. `organisations`.
	pub scope: String,
	/// Service the scoped resources live in.
	pub resource_service: String,
	pub authorisations_service: String,
	/// Also grant service access to `resource_service` when the list is non-empty.
	pub grant_service: bool,
}

impl ScopeAbilities {
	pub fn new(scope: impl Into<String>, resource_service: impl Into<String>) -> Self {
		Self {
			scope: scope.into(),
			resource_service: resource_service.into(),
			authorisations_service: "authorisations".to_string(),
			grant_service: true,
		}
	}

	/// Leaves service access on `resource_service` to other hooks.
	pub fn without_service_access(mut self) -> Self {
		self.grant_service = false;
		self
	}
}

impl AbilityHook for ScopeAbilities {
	fn define(&self, subject: Option<&Subject>, builder: &mut AbilityBuilder) {
		let Some(subject) = subject else {
			return;
		};
		let entries = subject.scope(&self.scope);
		if self.grant_service && !entries.is_empty() {
			builder.can(Action::Service, &self.resource_service);
		}
		for entry in &entries {
			define_resource_rules(
				entry,
				&self.resource_service,
				&self.authorisations_service,
				builder,
			);
		}
	}
}
