// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Default abilities every subject gets on the users service.

use serde_json::json;

use crate::ability::{AbilityBuilder, AbilityHook, Action};
use crate::types::Subject;

/// Self-registration for everyone; profile management, authorisations and
/// storage access for authenticated subjects.
#[derive(Debug, Clone)]
pub struct UserAbilities {
	pub users_service: String,
	pub authorisations_service: String,
	pub storage_service: String,
}

impl Default for UserAbilities {
	fn default() -> Self {
		Self {
			users_service: "users".to_string(),
			authorisations_service: "authorisations".to_string(),
			storage_service: "storage".to_string(),
		}
	}
}

impl AbilityHook for UserAbilities {
	fn define(&self, subject: Option<&Subject>, builder: &mut AbilityBuilder) {
		let users = self.users_service.as_str();
		builder.can(Action::Service, users).can(Action::Create, users);

		let Some(id) = subject.and_then(Subject::id) else {
			return;
		};

		builder
			.can(Action::Read, users)
			.can_if([Action::Update, Action::Remove], users, json!({ "_id": id }))
			.can(Action::Service, &self.authorisations_service)
			.can(Action::Service, &self.storage_service);

		// Storage takes `id` on input and reports `_id` on output.
		let storage = self.storage_service.as_str();
		let avatar = format!("avatars/{id}");
		let thumbnail = format!("avatars/{id}.thumbnail");
		builder
			.can_if(Action::Create, storage, json!({ "id": avatar }))
			.can_if(Action::Create, storage, json!({ "id": thumbnail }))
			.can_if([Action::Read, Action::Remove], storage, json!({ "_id": avatar }))
			.can_if([Action::Read, Action::Remove], storage, json!({ "_id": thumbnail }));
	}
}
