// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Tag bookkeeping.
//!
//! A tag is identified by its `value` and `scope` and stored once per tag
//! service with a usage `count`. Resources keep summaries of their tags in a
//! `tags` array. Tag services are contextual, so a summary also records the
//! context of the service it came from.

use std::sync::Arc;

use futures::future::try_join_all;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use tracing::{debug, instrument};

use crate::error::{AuthError, Result, Translation};
use crate::query::Query;
use crate::service::{Method, Params, ResourceService};
use crate::types::{Document, DocumentId};

/// Field holding a resource's tag summaries.
pub const TAGS_FIELD: &str = "tags";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Tag {
	#[serde(rename = "_id", default, skip_serializing_if = "Option::is_none")]
	pub id: Option<DocumentId>,
	pub value: String,
	pub scope: String,
	#[serde(default, skip_serializing_if = "Option::is_none")]
	pub context: Option<DocumentId>,
	#[serde(default, skip_serializing_if = "Option::is_none")]
	pub count: Option<u64>,
	#[serde(flatten)]
	pub extra: Document,
}

impl Tag {
	pub fn new(value: impl Into<String>, scope: impl Into<String>) -> Self {
		Self {
			id: None,
			value: value.into(),
			scope: scope.into(),
			context: None,
			count: None,
			extra: Document::new(),
		}
	}

	pub fn with_context(mut self, context: impl Into<DocumentId>) -> Self {
		self.context = Some(context.into());
		self
	}

	/// Reads a tag from a document; value and scope must be non-empty.
	pub fn from_document(document: &Document) -> Result<Self> {
		let present = |field: &str| {
			document
				.get(field)
				.and_then(Value::as_str)
				.is_some_and(|s| !s.is_empty())
		};
		if !present("value") || !present("scope") {
			return Err(AuthError::bad_request(Translation::new(
				"server.tags.missing_value_or_scope",
			)));
		}
		Ok(serde_json::from_value(Value::Object(document.clone()))?)
	}

	pub fn to_document(&self) -> Result<Document> {
		match serde_json::to_value(self)? {
			Value::Object(document) => Ok(document),
			_ => Ok(Document::new()),
		}
	}

	fn lookup_query(&self) -> Query {
		let mut query = Query::new();
		query.insert("value".to_string(), json!(self.value));
		query.insert("scope".to_string(), json!(self.scope));
		query
	}
}

/// Same value and scope; contexts are compared only when both are set.
pub fn is_tag_equal(a: &Tag, b: &Tag) -> bool {
	let mut equal = a.value == b.value && a.scope == b.scope;
	if let (Some(left), Some(right)) = (&a.context, &b.context) {
		equal = equal && left == right;
	}
	equal
}

/// Tag summaries stored on a resource; malformed entries are skipped.
pub fn resource_tags(resource: &Document) -> Vec<Tag> {
	resource
		.get(TAGS_FIELD)
		.and_then(Value::as_array)
		.into_iter()
		.flatten()
		.filter_map(|tag| serde_json::from_value(tag.clone()).ok())
		.collect()
}

// =============================================================================
// Tag services
// =============================================================================

/// Creates the tag described by `data`, or bumps the count of the existing
/// tag with the same value and scope.
#[instrument(level = "debug", skip(tags, data), fields(service = %tags.path()))]
pub async fn add_tag_if_new(tags: &dyn ResourceService, data: Document) -> Result<Tag> {
	let tag = Tag::from_document(&data)?;
	let params = Params::internal().with_query(tag.lookup_query());
	let existing = tags.find(&params).await?;

	if let Some(found) = existing.data.first() {
		let mut found = Tag::from_document(found)?;
		let count = found.count.unwrap_or(0) + 1;
		let id = found.id.clone().ok_or_else(|| AuthError::missing_field("_id"))?;
		let mut patch = Document::new();
		patch.insert("count".to_string(), json!(count));
		tags.patch(&id, patch, &Params::internal()).await?;
		found.count = Some(count);
		debug!(value = %found.value, scope = %found.scope, count, "tag count increased");
		return Ok(found);
	}

	let mut data = data;
	data.insert("count".to_string(), json!(1));
	let created = tags.create(data, &Params::internal()).await?;
	debug!(value = %tag.value, scope = %tag.scope, "tag created");
	Tag::from_document(&created)
}

/// Decrements the count of the tag with `value` and `scope`, deleting it once
/// unused. Returns `None` when no such tag exists.
#[instrument(level = "debug", skip(tags), fields(service = %tags.path()))]
pub async fn remove_tag_if_unused(
	tags: &dyn ResourceService,
	value: &str,
	scope: &str,
) -> Result<Option<Tag>> {
	let lookup = Tag::new(value, scope);
	if value.is_empty() || scope.is_empty() {
		return Err(AuthError::bad_request(Translation::new(
			"server.tags.missing_value_or_scope",
		)));
	}

	let existing = tags
		.find(&Params::internal().with_query(lookup.lookup_query()))
		.await?;
	let Some(found) = existing.data.first() else {
		debug!(value, scope, "no tag to remove");
		return Ok(None);
	};

	let mut found = Tag::from_document(found)?;
	let id = found.id.clone().ok_or_else(|| AuthError::missing_field("_id"))?;
	let count = found.count.unwrap_or(0).saturating_sub(1);
	found.count = Some(count);
	if count == 0 {
		tags.remove(&id, &Params::internal()).await?;
		debug!(value, scope, "unused tag removed");
	} else {
		let mut patch = Document::new();
		patch.insert("count".to_string(), json!(count));
		tags.patch(&id, patch, &Params::internal()).await?;
		debug!(value, scope, count, "tag count decreased");
	}
	Ok(Some(found))
}

// =============================================================================
// Tagged resources
// =============================================================================

fn tags_patch(tags: &[Tag]) -> Result<Document> {
	let mut patch = Document::new();
	patch.insert(TAGS_FIELD.to_string(), serde_json::to_value(tags)?);
	Ok(patch)
}

/// Adds `tag` to the resource's summaries unless already present.
///
/// `tag_context` is the context of the tag service the tag came from.
/// Returns the patched resource, or `None` when nothing changed.
pub async fn tag_resource(
	resources: &dyn ResourceService,
	resource: &Document,
	mut tag: Tag,
	tag_context: Option<&DocumentId>,
	params: &Params,
) -> Result<Option<Document>> {
	let mut tags = resource_tags(resource);
	if tags.iter().any(|existing| is_tag_equal(existing, &tag)) {
		return Ok(None);
	}
	if let Some(context) = tag_context {
		tag.context = Some(context.clone());
	}

	let id = DocumentId::of(resource).ok_or_else(|| AuthError::missing_field("_id"))?;
	debug!(resource = %id, value = %tag.value, scope = %tag.scope, "tagging resource");
	tags.push(tag);
	let patched = resources.patch(&id, tags_patch(&tags)?, &params.nested()).await?;
	Ok(Some(patched))
}

/// Removes `tag` from the resource's summaries when present.
pub async fn untag_resource(
	resources: &dyn ResourceService,
	resource: &Document,
	tag: &Tag,
	params: &Params,
) -> Result<Option<Document>> {
	let mut tags = resource_tags(resource);
	let Some(index) = tags.iter().position(|existing| is_tag_equal(existing, tag)) else {
		return Ok(None);
	};

	let id = DocumentId::of(resource).ok_or_else(|| AuthError::missing_field("_id"))?;
	debug!(resource = %id, value = %tag.value, scope = %tag.scope, "untagging resource");
	tags.remove(index);
	let patched = resources.patch(&id, tags_patch(&tags)?, &params.nested()).await?;
	Ok(Some(patched))
}

/// Finds the tag service of a context.
pub trait TagServiceResolver: Send + Sync {
	fn tag_service(&self, context: Option<&DocumentId>) -> Option<Arc<dyn ResourceService>>;
}

fn resolve(
	resolver: &dyn TagServiceResolver,
	tag: &Tag,
	context: Option<&DocumentId>,
) -> Result<Arc<dyn ResourceService>> {
	let context = tag.context.as_ref().or(context);
	resolver.tag_service(context).ok_or_else(|| {
		AuthError::bad_request(
			Translation::new("server.tags.missing_context").with(
				"context",
				context.map_or_else(|| "-".to_string(), ToString::to_string),
			),
		)
	})
}

async fn add_all(
	resolver: &dyn TagServiceResolver,
	tags: Vec<Tag>,
	context: Option<&DocumentId>,
) -> Result<Vec<Tag>> {
	try_join_all(tags.into_iter().map(|tag| async move {
		let service = resolve(resolver, &tag, context)?;
		let mut created = add_tag_if_new(service.as_ref(), tag.to_document()?).await?;
		if created.context.is_none() {
			created.context = context.cloned();
		}
		Ok::<_, AuthError>(created)
	}))
	.await
}

async fn remove_all(
	resolver: &dyn TagServiceResolver,
	tags: &[Tag],
	context: Option<&DocumentId>,
) -> Result<()> {
	try_join_all(tags.iter().map(|tag| async move {
		let service = resolve(resolver, tag, context)?;
		remove_tag_if_unused(service.as_ref(), &tag.value, &tag.scope).await
	}))
	.await?;
	Ok(())
}

/// Keeps tag services in sync with the tags of an item being written.
///
/// With a previous version, tags that disappeared are released and new ones
/// registered; without one, every tag is registered (or released on remove).
/// The item's `tags` are rewritten with the stored tags, stamped with
/// `context` when they carry none.
#[instrument(level = "debug", skip(resolver, method, item, previous), fields(method = %method))]
pub async fn update_tags(
	resolver: &dyn TagServiceResolver,
	method: Method,
	item: &mut Document,
	previous: Option<&Document>,
	context: Option<&DocumentId>,
) -> Result<()> {
	if !item.contains_key(TAGS_FIELD) {
		debug!("no tags to update");
		return Ok(());
	}
	let current = resource_tags(item);

	let tags = match previous.filter(|previous| previous.contains_key(TAGS_FIELD)) {
		Some(previous) => {
			let previous = resource_tags(previous);
			let (common, added): (Vec<Tag>, Vec<Tag>) = current
				.into_iter()
				.partition(|tag| previous.iter().any(|old| is_tag_equal(tag, old)));
			let removed: Vec<Tag> = previous
				.into_iter()
				.filter(|old| !common.iter().any(|tag| is_tag_equal(tag, old)))
				.collect();

			debug!(added = added.len(), removed = removed.len(), "updating tags");
			let (_, added) = futures::try_join!(
				remove_all(resolver, &removed, context),
				add_all(resolver, added, context),
			)?;
			common.into_iter().chain(added).collect()
		}
		None if method == Method::Remove => {
			remove_all(resolver, &current, context).await?;
			return Ok(());
		}
		None => add_all(resolver, current, context).await?,
	};

	item.insert(TAGS_FIELD.to_string(), serde_json::to_value(&tags)?);
	Ok(())
}

/// Loads the stored version of an item before it is overwritten.
///
/// Best effort: a failed lookup yields `None`.
pub async fn populate_previous(service: &dyn ResourceService, id: &DocumentId) -> Option<Document> {
	let params = Params::internal().with_check_authorisation(false);
	match service.get(id, &params).await {
		Ok(previous) => Some(previous),
		Err(e) => {
			debug!(id = %id, error = %e, "previous item unavailable");
			None
		}
	}
}
