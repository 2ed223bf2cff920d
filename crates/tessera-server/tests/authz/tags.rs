// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

use serde_json::json;
use tessera_server_auth::{hook, Action, Document, DocumentId, Method, Params, ResourceService};
use tessera_server_db::SqliteDocumentService;

use super::support::{run_authz_cases, AuthzCase, TestApp};

const ORG: &str = "org1";
const TAGS: &str = "org1/tags";
const DOCUMENTS: &str = "org1/documents";

/// Registered users work on tagged documents and tags of `org1`.
async fn tagged_app() -> TestApp {
	let app = TestApp::new().await;
	app.app.register_hook(hook(|subject, builder| {
		if subject.and_then(|s| s.id()).is_none() {
			return;
		}
		builder
			.can(Action::Service, TAGS)
			.can(Action::Service, DOCUMENTS)
			.can_if(Action::All, "documents", json!({ "context": ORG }))
			.can_if(
				[Action::Create, Action::Read, Action::Remove],
				"tags",
				json!({ "context": ORG }),
			);
	}));

	let context = DocumentId::from(ORG);
	app.app.register_tags(std::sync::Arc::new(
		SqliteDocumentService::new(app.pool.clone(), "tags").with_context(ORG),
	));
	app.app
		.register_collection(&app.pool, "documents", Some(&context), true);
	app
}

async fn tag_counts(app: &TestApp) -> Vec<(String, u64)> {
	let tags = app
		.app
		.service("tags", Some(&DocumentId::from(ORG)))
		.unwrap()
		.find(&Params::internal())
		.await
		.unwrap();
	let mut counts: Vec<(String, u64)> = tags
		.data
		.iter()
		.map(|tag| {
			(
				tag["value"].as_str().unwrap().to_string(),
				tag["count"].as_u64().unwrap(),
			)
		})
		.collect();
	counts.sort();
	counts
}

async fn stored_document(app: &TestApp, id: &str) -> Document {
	app.app
		.service("documents", Some(&DocumentId::from(ORG)))
		.unwrap()
		.get(&DocumentId::from(id), &Params::internal())
		.await
		.unwrap()
}

#[tokio::test]
async fn test_tags_authorization() {
	let app = tagged_app().await;
	let fixtures = &app.fixtures;

	let cases = vec![
		// POST org1/tags - anonymous_cannot_create_tag
		AuthzCase {
			name: "anonymous_cannot_create_tag",
			method: Method::Create,
			path: TAGS.to_string(),
			id: None,
			user: None,
			body: Some(json!({ "value": "urgent", "scope": "priority" })),
			expected_status: 403,
		},
		// POST org1/tags - registered_can_create_tag
		AuthzCase {
			name: "registered_can_create_tag",
			method: Method::Create,
			path: TAGS.to_string(),
			id: None,
			user: Some(fixtures.outsider.clone()),
			body: Some(json!({ "value": "urgent", "scope": "priority" })),
			expected_status: 200,
		},
		// POST org1/tags - tag_without_scope_rejected
		AuthzCase {
			name: "tag_without_scope_rejected",
			method: Method::Create,
			path: TAGS.to_string(),
			id: None,
			user: Some(fixtures.outsider.clone()),
			body: Some(json!({ "value": "urgent" })),
			expected_status: 400,
		},
		// GET org1/tags - registered_can_list_tags
		AuthzCase {
			name: "registered_can_list_tags",
			method: Method::Find,
			path: TAGS.to_string(),
			id: None,
			user: Some(fixtures.member.clone()),
			body: None,
			expected_status: 200,
		},
		// PATCH org1/tags/{id} - external_patch_not_allowed
		AuthzCase {
			name: "external_patch_not_allowed",
			method: Method::Patch,
			path: TAGS.to_string(),
			id: Some("t1".to_string()),
			user: Some(fixtures.member.clone()),
			body: Some(json!({ "count": 10 })),
			expected_status: 400,
		},
		// DELETE org1/tags/{id} - anonymous_cannot_remove_tag
		AuthzCase {
			name: "anonymous_cannot_remove_tag",
			method: Method::Remove,
			path: TAGS.to_string(),
			id: Some("d1".to_string()),
			user: None,
			body: Some(json!({ "value": "urgent", "scope": "priority" })),
			expected_status: 403,
		},
	];

	run_authz_cases(&app, &cases).await;
}

#[tokio::test]
async fn test_tagging_and_untagging_a_resource() {
	let app = tagged_app().await;
	let user = &app.fixtures.member;
	app.call(
		DOCUMENTS,
		Method::Create,
		None,
		Some(user),
		Some(json!({ "_id": "d1", "title": "Report" })),
	)
	.await
	.unwrap();

	app.call(
		"org1/tags",
		Method::Create,
		None,
		Some(user),
		Some(json!({
			"value": "urgent",
			"scope": "priority",
			"resource": "d1",
			"resourcesService": DOCUMENTS,
		})),
	)
	.await
	.unwrap();
	let document = stored_document(&app, "d1").await;
	assert_eq!(document["tags"][0]["value"], json!("urgent"));
	assert_eq!(document["tags"][0]["context"], json!(ORG));
	assert_eq!(tag_counts(&app).await, vec![("urgent".to_string(), 1)]);

	app.call(
		TAGS,
		Method::Remove,
		Some("d1"),
		Some(user),
		Some(json!({
			"value": "urgent",
			"scope": "priority",
			"resourcesService": DOCUMENTS,
		})),
	)
	.await
	.unwrap();
	assert_eq!(stored_document(&app, "d1").await["tags"], json!([]));
	assert!(tag_counts(&app).await.is_empty());
}

#[tokio::test]
async fn test_tagged_writes_keep_counts() {
	let app = tagged_app().await;
	let user = &app.fixtures.member;
	let urgent = json!({ "value": "urgent", "scope": "priority" });
	let blue = json!({ "value": "blue", "scope": "colour" });

	for (id, tags) in [("d1", json!([urgent, blue])), ("d2", json!([urgent]))] {
		app.call(
			DOCUMENTS,
			Method::Create,
			None,
			Some(user),
			Some(json!({ "_id": id, "tags": tags })),
		)
		.await
		.unwrap();
	}
	assert_eq!(
		tag_counts(&app).await,
		vec![("blue".to_string(), 1), ("urgent".to_string(), 2)]
	);
	let d1 = stored_document(&app, "d1").await;
	assert_eq!(d1["tags"][0]["context"], json!(ORG));
	assert!(d1["tags"][0].get("_id").is_some());

	// Dropping a tag on patch releases it.
	app.call(
		DOCUMENTS,
		Method::Patch,
		Some("d1"),
		Some(user),
		Some(json!({ "tags": [urgent] })),
	)
	.await
	.unwrap();
	assert_eq!(tag_counts(&app).await, vec![("urgent".to_string(), 2)]);

	// Removing a document releases its tags.
	app.call(DOCUMENTS, Method::Remove, Some("d2"), Some(user), None)
		.await
		.unwrap();
	assert_eq!(tag_counts(&app).await, vec![("urgent".to_string(), 1)]);

	app.call(DOCUMENTS, Method::Remove, Some("d1"), Some(user), None)
		.await
		.unwrap();
	assert!(tag_counts(&app).await.is_empty());
}

#[tokio::test]
async fn test_find_strips_context_from_filters() {
	let app = tagged_app().await;
	let user = &app.fixtures.member;
	app.call(
		DOCUMENTS,
		Method::Create,
		None,
		Some(user),
		Some(json!({ "_id": "d1", "title": "Report" })),
	)
	.await
	.unwrap();

	// Rules constrain `context`, which documents never store.
	let page = app
		.call(DOCUMENTS, Method::Find, None, Some(user), None)
		.await
		.unwrap()
		.into_page()
		.unwrap();
	assert_eq!(page.total, 1);
	assert!(page.data[0].get("context").is_none());
}
