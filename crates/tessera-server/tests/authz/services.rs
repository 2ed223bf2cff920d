// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

use serde_json::json;
use tessera_server_auth::{DocumentId, Method, Operation, Params, ResourceService};

use super::support::{run_authz_cases, AuthzCase, TestApp, GROUPS};

#[tokio::test]
async fn test_users_authorization() {
	let app = TestApp::new().await;
	let fixtures = &app.fixtures;

	let cases = vec![
		// POST users - anonymous_can_register
		AuthzCase {
			name: "anonymous_can_register",
			method: Method::Create,
			path: "users".to_string(),
			id: None,
			user: None,
			body: Some(json!({ "name": "New User" })),
			expected_status: 200,
		},
		// GET users/{id} - anonymous_cannot_read_user
		AuthzCase {
			name: "anonymous_cannot_read_user",
			method: Method::Get,
			path: "users".to_string(),
			id: Some("member".to_string()),
			user: None,
			body: None,
			expected_status: 403,
		},
		// GET users/{id} - registered_can_read_any_user
		AuthzCase {
			name: "registered_can_read_any_user",
			method: Method::Get,
			path: "users".to_string(),
			id: Some("member".to_string()),
			user: Some(fixtures.outsider.clone()),
			body: None,
			expected_status: 200,
		},
		// PATCH users/{id} - user_can_update_self
		AuthzCase {
			name: "user_can_update_self",
			method: Method::Patch,
			path: "users".to_string(),
			id: Some("outsider".to_string()),
			user: Some(fixtures.outsider.clone()),
			body: Some(json!({ "name": "Still Outside" })),
			expected_status: 200,
		},
		// PATCH users/{id} - user_cannot_update_other
		AuthzCase {
			name: "user_cannot_update_other",
			method: Method::Patch,
			path: "users".to_string(),
			id: Some("member".to_string()),
			user: Some(fixtures.outsider.clone()),
			body: Some(json!({ "name": "Hijacked" })),
			expected_status: 403,
		},
		// DELETE users/{id} - user_cannot_remove_other
		AuthzCase {
			name: "user_cannot_remove_other",
			method: Method::Remove,
			path: "users".to_string(),
			id: Some("member".to_string()),
			user: Some(fixtures.owner.clone()),
			body: None,
			expected_status: 403,
		},
		// GET users/{id} - missing_user_is_not_found
		AuthzCase {
			name: "missing_user_is_not_found",
			method: Method::Get,
			path: "users".to_string(),
			id: Some("nobody".to_string()),
			user: Some(fixtures.outsider.clone()),
			body: None,
			expected_status: 404,
		},
		// GET unknown - unregistered_service_is_not_found
		AuthzCase {
			name: "unregistered_service_is_not_found",
			method: Method::Find,
			path: "projects".to_string(),
			id: None,
			user: Some(fixtures.owner.clone()),
			body: None,
			expected_status: 404,
		},
	];

	run_authz_cases(&app, &cases).await;
}

#[tokio::test]
async fn test_groups_authorization() {
	let app = TestApp::new().await;
	let fixtures = &app.fixtures;

	let cases = vec![
		// GET groups - outsider_has_no_service_access
		AuthzCase {
			name: "outsider_has_no_service_access",
			method: Method::Find,
			path: GROUPS.to_string(),
			id: None,
			user: Some(fixtures.outsider.clone()),
			body: None,
			expected_status: 403,
		},
		// GET groups/{id} - member_can_get_own_group
		AuthzCase {
			name: "member_can_get_own_group",
			method: Method::Get,
			path: GROUPS.to_string(),
			id: Some("g1".to_string()),
			user: Some(fixtures.member.clone()),
			body: None,
			expected_status: 200,
		},
		// GET groups/{id} - member_cannot_get_other_group
		AuthzCase {
			name: "member_cannot_get_other_group",
			method: Method::Get,
			path: GROUPS.to_string(),
			id: Some("g2".to_string()),
			user: Some(fixtures.member.clone()),
			body: None,
			expected_status: 403,
		},
		// PATCH groups/{id} - member_cannot_update_group
		AuthzCase {
			name: "member_cannot_update_group",
			method: Method::Patch,
			path: GROUPS.to_string(),
			id: Some("g1".to_string()),
			user: Some(fixtures.member.clone()),
			body: Some(json!({ "name": "Renamed" })),
			expected_status: 403,
		},
		// PATCH groups/{id} - manager_can_update_group
		AuthzCase {
			name: "manager_can_update_group",
			method: Method::Patch,
			path: GROUPS.to_string(),
			id: Some("g1".to_string()),
			user: Some(fixtures.manager.clone()),
			body: Some(json!({ "name": "Renamed" })),
			expected_status: 200,
		},
		// DELETE groups/{id} - manager_cannot_remove_group
		AuthzCase {
			name: "manager_cannot_remove_group",
			method: Method::Remove,
			path: GROUPS.to_string(),
			id: Some("g1".to_string()),
			user: Some(fixtures.manager.clone()),
			body: None,
			expected_status: 403,
		},
		// DELETE groups/{id} - other_owner_cannot_remove_group
		AuthzCase {
			name: "other_owner_cannot_remove_group",
			method: Method::Remove,
			path: GROUPS.to_string(),
			id: Some("g1".to_string()),
			user: Some(fixtures.other_owner.clone()),
			body: None,
			expected_status: 403,
		},
		// POST groups - owner_cannot_create_group
		AuthzCase {
			name: "owner_cannot_create_group",
			method: Method::Create,
			path: GROUPS.to_string(),
			id: None,
			user: Some(fixtures.owner.clone()),
			body: Some(json!({ "name": "Group Three" })),
			expected_status: 403,
		},
		// DELETE groups/{id} - owner_can_remove_group
		AuthzCase {
			name: "owner_can_remove_group",
			method: Method::Remove,
			path: GROUPS.to_string(),
			id: Some("g1".to_string()),
			user: Some(fixtures.owner.clone()),
			body: None,
			expected_status: 200,
		},
	];

	run_authz_cases(&app, &cases).await;
}

#[tokio::test]
async fn test_find_is_narrowed_to_accessible_groups() {
	let app = TestApp::new().await;

	let page = app
		.call(GROUPS, Method::Find, None, Some(&app.fixtures.member), None)
		.await
		.unwrap()
		.into_page()
		.unwrap();
	assert_eq!(page.total, 1);
	assert_eq!(page.data[0]["_id"], json!("g1"));

	// Client filters are kept next to the ability filter.
	let page = app
		.call(
			GROUPS,
			Method::Find,
			None,
			Some(&app.fixtures.member),
			Some(json!({ "name": "Group Two" })),
		)
		.await
		.unwrap()
		.into_page()
		.unwrap();
	assert_eq!(page.total, 0);
}

async fn stored_groups(app: &TestApp) -> Vec<serde_json::Value> {
	let page = app
		.app
		.service(GROUPS, None)
		.unwrap()
		.find(&Params::internal())
		.await
		.unwrap();
	let mut groups: Vec<_> = page
		.data
		.iter()
		.map(|group| json!({ "_id": group["_id"], "name": group["name"] }))
		.collect();
	groups.sort_by_key(|group| group["_id"].as_str().map(str::to_string));
	groups
}

#[tokio::test]
async fn test_collection_remove_is_narrowed_to_owned_groups() {
	let app = TestApp::new().await;

	let page = app
		.call(GROUPS, Method::Remove, None, Some(&app.fixtures.member), None)
		.await
		.unwrap()
		.into_page()
		.unwrap();
	assert_eq!(page.total, 0);
	assert_eq!(stored_groups(&app).await.len(), 2);

	let page = app
		.call(GROUPS, Method::Remove, None, Some(&app.fixtures.owner), None)
		.await
		.unwrap()
		.into_page()
		.unwrap();
	assert_eq!(page.total, 1);
	assert_eq!(page.data[0]["_id"], json!("g1"));
	assert_eq!(
		stored_groups(&app).await,
		vec![json!({ "_id": "g2", "name": "Group Two" })]
	);
}

#[tokio::test]
async fn test_collection_patch_is_narrowed_to_managed_groups() {
	let app = TestApp::new().await;

	let page = app
		.call(
			GROUPS,
			Method::Patch,
			None,
			Some(&app.fixtures.manager),
			Some(json!({ "name": "Renamed" })),
		)
		.await
		.unwrap()
		.into_page()
		.unwrap();
	assert_eq!(page.total, 1);
	assert_eq!(
		stored_groups(&app).await,
		vec![
			json!({ "_id": "g1", "name": "Renamed" }),
			json!({ "_id": "g2", "name": "Group Two" }),
		]
	);
}

#[tokio::test]
async fn test_find_without_accessible_documents_is_empty() {
	let app = TestApp::new().await;

	let page = app
		.call("users", Method::Find, None, None, None)
		.await
		.unwrap()
		.into_page()
		.unwrap();
	assert_eq!(page.total, 0);
	assert!(page.data.is_empty());
}

#[tokio::test]
async fn test_internal_calls_skip_checks() {
	let app = TestApp::new().await;

	let result = app
		.app
		.call(GROUPS, Operation::remove("g2", Params::internal()))
		.await
		.unwrap();
	assert_eq!(result.into_item().unwrap()["_id"], json!("g2"));

	let err = app
		.app
		.call(
			GROUPS,
			Operation::get("g1", Params::internal().with_check_authorisation(true)),
		)
		.await
		.unwrap_err();
	assert!(err.is_forbidden());
}

#[tokio::test]
async fn test_forbidden_message_is_localized() {
	let app = TestApp::new().await;

	let err = app
		.call(GROUPS, Method::Get, Some("g2"), Some(&app.fixtures.member), None)
		.await
		.unwrap_err();
	assert_eq!(
		err.translation_key(),
		Some("server.auth.forbidden.operation")
	);
	assert_eq!(
		app.app.error_message(&err, None),
		"You are not allowed to perform get operation on service groups"
	);
	assert_eq!(
		app.app.error_message(&err, Some("es")),
		"No tiene permiso para realizar la operación get en el servicio groups"
	);
}

#[tokio::test]
async fn test_hook_registration_refreshes_abilities() {
	let app = TestApp::new().await;
	let outsider = &app.fixtures.outsider;

	let err = app
		.call(GROUPS, Method::Get, Some("g2"), Some(outsider), None)
		.await
		.unwrap_err();
	assert!(err.is_forbidden());

	let hook = tessera_server_auth::hook(|subject, builder| {
		if subject.and_then(|s| s.id()) == Some(DocumentId::from("outsider")) {
			builder.can(tessera_server_auth::Action::Service, GROUPS);
			builder.can(tessera_server_auth::Action::Read, GROUPS);
		}
	});
	assert!(app.app.register_hook(hook.clone()));
	app.call(GROUPS, Method::Get, Some("g2"), Some(outsider), None)
		.await
		.unwrap();

	assert!(app.app.unregister_hook(&hook));
	let err = app
		.call(GROUPS, Method::Get, Some("g2"), Some(outsider), None)
		.await
		.unwrap_err();
	assert!(err.is_forbidden());
}
