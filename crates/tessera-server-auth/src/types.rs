// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Core type definitions for authorisation.
//!
//! - **Documents**: resources and subjects are schemaless JSON objects
//!   ([`Document`]) addressed by an opaque [`DocumentId`]
//! - **Roles**: the ordered [`Role`] ladder used inside scope entries
//! - **Scopes**: named lists of [`ScopeEntry`] stored on a [`Subject`], one per
//!   resource the subject holds a role on
//! - **Typed resources**: [`TypedResource`] pairs a payload with the resource
//!   type rules are written against

use serde::de::{self, Deserializer, Visitor};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::fmt;
use std::str::FromStr;
use tracing::warn;
use uuid::Uuid;

/// A stored JSON object.
pub type Document = Map<String, Value>;

/// Field holding a document's identifier.
pub const ID_FIELD: &str = "_id";

// =============================================================================
// Document IDs
// =============================================================================

/// Opaque identifier of a stored document.
///
/// Ids compare by their string form; numeric ids deserialize to their
/// decimal rendering.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
#[serde(transparent)]
pub struct DocumentId(String);

impl DocumentId {
	pub fn new(id: impl Into<String>) -> Self {
		Self(id.into())
	}

	/// Generate a new random ID.
	pub fn generate() -> Self {
		Self(Uuid::new_v4().simple().to_string())
	}

	pub fn as_str(&self) -> &str {
		&self.0
	}

	/// Reads an id out of a JSON value; strings and integers are accepted.
	pub fn from_value(value: &Value) -> Option<Self> {
		match value {
			Value::String(s) if !s.is_empty() => Some(Self(s.clone())),
			Value::Number(n) => Some(Self(n.to_string())),
			_ => None,
		}
	}

	/// Reads the `_id` field of a document.
	pub fn of(document: &Document) -> Option<Self> {
		document.get(ID_FIELD).and_then(Self::from_value)
	}
}

impl fmt::Display for DocumentId {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		f.write_str(&self.0)
	}
}

impl From<&str> for DocumentId {
	fn from(id: &str) -> Self {
		Self(id.to_string())
	}
}

impl From<String> for DocumentId {
	fn from(id: String) -> Self {
		Self(id)
	}
}

impl<'de> Deserialize<'de> for DocumentId {
	fn deserialize<D: Deserializer<'de>>(deserializer: D) -> std::result::Result<Self, D::Error> {
		deserializer.deserialize_any(DocumentIdVisitor)
	}
}

struct DocumentIdVisitor;

impl<'de> Visitor<'de> for DocumentIdVisitor {
	type Value = DocumentId;

	fn expecting(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		f.write_str("a non-empty string or a number")
	}

	fn visit_str<E: de::Error>(self, v: &str) -> std::result::Result<DocumentId, E> {
		if v.is_empty() {
			return Err(E::invalid_value(de::Unexpected::Str(v), &self));
		}
		Ok(DocumentId::from(v))
	}

	fn visit_string<E: de::Error>(self, v: String) -> std::result::Result<DocumentId, E> {
		if v.is_empty() {
			return Err(E::invalid_value(de::Unexpected::Str(&v), &self));
		}
		Ok(DocumentId(v))
	}

	fn visit_i64<E: de::Error>(self, v: i64) -> std::result::Result<DocumentId, E> {
		Ok(DocumentId(v.to_string()))
	}

	fn visit_u64<E: de::Error>(self, v: u64) -> std::result::Result<DocumentId, E> {
		Ok(DocumentId(v.to_string()))
	}

	fn visit_f64<E: de::Error>(self, v: f64) -> std::result::Result<DocumentId, E> {
		serde_json::Number::from_f64(v)
			.map(|n| DocumentId(n.to_string()))
			.ok_or_else(|| E::invalid_value(de::Unexpected::Float(v), &self))
	}
}

impl From<DocumentId> for Value {
	fn from(id: DocumentId) -> Self {
		Value::String(id.0)
	}
}

// =============================================================================
// Roles
// =============================================================================

/// Role a subject holds on a resource.
///
/// Declaration order is rank order: `Member < Manager < Owner`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
	/// Read access to the resource.
	Member,
	/// Update access and management of the resource's authorisations.
	Manager,
	/// Full control including removal.
	Owner,
}

impl Role {
	/// Returns all roles, lowest rank first.
	pub fn all() -> &'static [Role] {
		&[Role::Member, Role::Manager, Role::Owner]
	}

	pub fn rank(self) -> u8 {
		match self {
			Role::Member => 0,
			Role::Manager => 1,
			Role::Owner => 2,
		}
	}

	pub fn from_rank(rank: u8) -> Option<Role> {
		Role::all().get(usize::from(rank)).copied()
	}

	pub fn name(self) -> &'static str {
		match self {
			Role::Member => "member",
			Role::Manager => "manager",
			Role::Owner => "owner",
		}
	}

	/// Returns true if this role has at least the permissions of the given role.
	pub fn has_permission_of(&self, other: &Role) -> bool {
		self >= other
	}
}

impl fmt::Display for Role {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		f.write_str(self.name())
	}
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("unknown role: {0}")]
pub struct UnknownRole(pub String);

impl FromStr for Role {
	type Err = UnknownRole;

	fn from_str(s: &str) -> Result<Self, Self::Err> {
		Role::all()
			.iter()
			.copied()
			.find(|role| role.name() == s)
			.ok_or_else(|| UnknownRole(s.to_string()))
	}
}

/// Rank of a role name; `None` for names outside the ladder.
pub fn rank(name: &str) -> Option<u8> {
	name.parse::<Role>().ok().map(Role::rank)
}

/// Role name of a rank; `None` for ranks outside the ladder.
pub fn name_of(rank: u8) -> Option<&'static str> {
	Role::from_rank(rank).map(Role::name)
}

// =============================================================================
// Scopes
// =============================================================================

/// One entry of a subject's scope list.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ScopeEntry {
	#[serde(rename = "_id")]
	pub id: DocumentId,
	/// Role name; kept as a string so unknown values survive a rewrite.
	#[serde(default)]
	pub permissions: String,
	#[serde(default, skip_serializing_if = "Option::is_none")]
	pub context: Option<DocumentId>,
	#[serde(flatten)]
	pub extra: Document,
}

impl ScopeEntry {
	pub fn new(resource: &ResourceRef, role: Role) -> Self {
		Self {
			id: resource.id.clone(),
			permissions: role.to_string(),
			context: resource.context.clone(),
			extra: Document::new(),
		}
	}

	/// The entry's role; `None` when the stored name is unknown.
	pub fn role(&self) -> Option<Role> {
		self.permissions.parse().ok()
	}
}

/// The resource side of a grant: its id and the context it lives in.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResourceRef {
	pub id: DocumentId,
	pub context: Option<DocumentId>,
}

impl ResourceRef {
	pub fn new(id: impl Into<DocumentId>) -> Self {
		Self {
			id: id.into(),
			context: None,
		}
	}

	pub fn with_context(mut self, context: impl Into<DocumentId>) -> Self {
		self.context = Some(context.into());
		self
	}
}

// =============================================================================
// Subjects
// =============================================================================

/// An actor document (usually a user) carrying scope lists.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Subject(Document);

impl Subject {
	pub fn new(document: Document) -> Self {
		Self(document)
	}

	pub fn with_id(id: impl Into<DocumentId>) -> Self {
		let mut document = Document::new();
		document.insert(ID_FIELD.to_string(), id.into().into());
		Self(document)
	}

	pub fn id(&self) -> Option<DocumentId> {
		DocumentId::of(&self.0)
	}

	/// Soft-deleted subjects keep their document but carry `deleted: true`.
	pub fn is_deleted(&self) -> bool {
		self.0.get("deleted").and_then(Value::as_bool).unwrap_or(false)
	}

	/// Entries of the named scope list.
	///
	/// Malformed entries are skipped; a missing list is empty.
	pub fn scope(&self, name: &str) -> Vec<ScopeEntry> {
		let Some(Value::Array(items)) = self.0.get(name) else {
			return Vec::new();
		};
		items
			.iter()
			.filter_map(|item| match serde_json::from_value(item.clone()) {
				Ok(entry) => Some(entry),
				Err(e) => {
					warn!(scope = name, error = %e, "skipping malformed scope entry");
					None
				}
			})
			.collect()
	}

	pub fn scope_entry(&self, name: &str, resource_id: &DocumentId) -> Option<ScopeEntry> {
		self.scope(name)
			.into_iter()
			.find(|entry| &entry.id == resource_id)
	}

	pub fn set_scope(&mut self, name: &str, entries: &[ScopeEntry]) -> serde_json::Result<()> {
		let value = serde_json::to_value(entries)?;
		self.0.insert(name.to_string(), value);
		Ok(())
	}

	fn stored_scope(&self, name: &str) -> Vec<Value> {
		match self.0.get(name) {
			Some(Value::Array(items)) => items.clone(),
			_ => Vec::new(),
		}
	}

	/// The stored scope list with `entry` in place of the item for its
	/// resource, or appended when there is none.
	///
	/// Other items are kept exactly as stored, malformed ones included. A
	/// replaced item keeps its stored `_id` value.
	pub fn scope_with(&self, name: &str, entry: &ScopeEntry) -> serde_json::Result<Value> {
		let mut items = self.stored_scope(name);
		let mut value = serde_json::to_value(entry)?;
		match items.iter().position(|item| item_id(item).as_ref() == Some(&entry.id)) {
			Some(index) => {
				if let (Some(stored_id), Some(object)) = (items[index].get(ID_FIELD), value.as_object_mut())
				{
					object.insert(ID_FIELD.to_string(), stored_id.clone());
				}
				items[index] = value;
			}
			None => items.push(value),
		}
		Ok(Value::Array(items))
	}

	/// The stored scope list without the items for `resource_id`; `None` when
	/// it holds none.
	pub fn scope_without(&self, name: &str, resource_id: &DocumentId) -> Option<Value> {
		let mut items = self.stored_scope(name);
		let before = items.len();
		items.retain(|item| item_id(item).as_ref() != Some(resource_id));
		(items.len() != before).then_some(Value::Array(items))
	}

	/// Stores `list` as the named scope list.
	pub fn replace_scope(&mut self, name: &str, list: Value) {
		self.0.insert(name.to_string(), list);
	}

	pub fn get(&self, field: &str) -> Option<&Value> {
		self.0.get(field)
	}

	pub fn as_document(&self) -> &Document {
		&self.0
	}

	pub fn into_document(self) -> Document {
		self.0
	}
}

fn item_id(item: &Value) -> Option<DocumentId> {
	item.get(ID_FIELD).and_then(DocumentId::from_value)
}

impl From<Document> for Subject {
	fn from(document: Document) -> Self {
		Self(document)
	}
}

// =============================================================================
// Typed resources
// =============================================================================

/// A resource payload tagged with the type its rules are written for.
#[derive(Debug, Clone, PartialEq)]
pub struct TypedResource {
	pub resource_type: String,
	pub payload: Document,
}

impl TypedResource {
	/// Shallow-copies `payload`, adding the service context when present.
	pub fn new(
		resource_type: impl Into<String>,
		payload: Option<&Document>,
		context: Option<&DocumentId>,
	) -> Self {
		let mut payload = payload.cloned().unwrap_or_default();
		if let Some(context) = context {
			payload.insert("context".to_string(), context.clone().into());
		}
		Self {
			resource_type: resource_type.into(),
			payload,
		}
	}
}
