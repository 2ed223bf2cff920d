// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Reverse lookups: which subjects hold a role on a resource.

use serde_json::{json, Value};
use tracing::instrument;

use crate::error::Result;
use crate::query::Query;
use crate::service::{Page, Params, ResourceService};
use crate::types::{DocumentId, Role};

/// Query matching subjects with an entry for `resource_id` in `scope`,
/// optionally holding exactly `role`.
pub fn subjects_query(scope: &str, resource_id: &DocumentId, role: Option<Role>) -> Query {
	let mut query = Query::new();
	query.insert(format!("{scope}._id"), resource_id.clone().into());
	if let Some(role) = role {
		query.insert(format!("{scope}.permissions"), Value::String(role.to_string()));
	}
	query
}

#[instrument(level = "debug", skip(service), fields(service = service.name()))]
pub async fn find_subjects_for_resource(
	service: &dyn ResourceService,
	scope: &str,
	resource_id: &DocumentId,
	role: Option<Role>,
) -> Result<Page> {
	let params = Params::internal().with_query(subjects_query(scope, resource_id, role));
	service.find(&params).await
}

/// Number of matching subjects; no documents are loaded.
#[instrument(level = "debug", skip(service), fields(service = service.name()))]
pub async fn count_subjects_for_resource(
	service: &dyn ResourceService,
	scope: &str,
	resource_id: &DocumentId,
	role: Option<Role>,
) -> Result<usize> {
	let mut query = subjects_query(scope, resource_id, role);
	query.insert("$limit".to_string(), json!(0));
	let page = service.find(&Params::internal().with_query(query)).await?;
	Ok(page.total)
}

#[cfg(test)]
mod tests {
	use super::*;
	use crate::memory::MemoryService;
	use crate::types::Document;

	fn doc(value: Value) -> Document {
		value.as_object().cloned().unwrap()
	}

	fn users() -> MemoryService {
		MemoryService::new("users").with_documents([
			doc(json!({ "_id": "a", "groups": [ { "_id": "g1", "permissions": "owner" } ] })),
			doc(json!({ "_id": "b", "groups": [
				{ "_id": "g2", "permissions": "manager" },
				{ "_id": "g1", "permissions": "member" },
			] })),
			doc(json!({ "_id": "c", "groups": [ { "_id": "g1", "permissions": "member" } ] })),
			doc(json!({ "_id": "d" })),
		])
	}

	#[test]
	fn test_query_shape() {
		assert_eq!(
			subjects_query("groups", &DocumentId::from("g1"), Some(Role::Member)),
			doc(json!({ "groups._id": "g1", "groups.permissions": "member" }))
		);
		assert_eq!(
			subjects_query("groups", &DocumentId::from("g1"), None),
			doc(json!({ "groups._id": "g1" }))
		);
	}

	#[tokio::test]
	async fn test_find_all_subjects() {
		let page = find_subjects_for_resource(&users(), "groups", &DocumentId::from("g1"), None)
			.await
			.unwrap();
		assert_eq!(page.total, 3);
	}

	#[tokio::test]
	async fn test_member_filter_is_applied() {
		let page = find_subjects_for_resource(&users(), "groups", &DocumentId::from("g1"), Some(Role::Member))
			.await
			.unwrap();
		let ids: Vec<_> = page.data.iter().filter_map(DocumentId::of).collect();
		assert_eq!(ids, vec![DocumentId::from("b"), DocumentId::from("c")]);
	}

	#[tokio::test]
	async fn test_count() {
		let service = users();
		let g1 = DocumentId::from("g1");
		assert_eq!(count_subjects_for_resource(&service, "groups", &g1, Some(Role::Owner)).await.unwrap(), 1);
		assert_eq!(
			count_subjects_for_resource(&service, "groups", &DocumentId::from("g3"), None)
				.await
				.unwrap(),
			0
		);
	}
}
