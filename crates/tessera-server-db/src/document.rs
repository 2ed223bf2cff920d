// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Document collections stored as JSON rows.
//!
//! Every collection shares the `documents` table, keyed by
//! `(collection, id)`. Queries are evaluated in process with the same
//! evaluator rule conditions use, so ability filters select identically here
//! and in memory.

use async_trait::async_trait;
use chrono::Utc;
use serde_json::Value;
use sqlx::{sqlite::SqlitePool, Row};
use tessera_server_auth::memory::paginate;
use tessera_server_auth::query;
use tessera_server_auth::{
	AuthError, Document, DocumentId, Page, Params, ResourceService, ID_FIELD,
};

use crate::error::DbError;

/// Repository for one document collection.
#[derive(Clone)]
pub struct SqliteDocumentService {
	pool: SqlitePool,
	collection: String,
	context: Option<DocumentId>,
	supports_get: bool,
}

impl SqliteDocumentService {
	/// Create a new repository over `collection`.
	///
	/// # Arguments
	/// * `pool` - SQLite connection pool
	/// * `collection` - Service name; also the resource type rules refer to
	pub fn new(pool: SqlitePool, collection: impl Into<String>) -> Self {
		Self {
			pool,
			collection: collection.into(),
			context: None,
			supports_get: true,
		}
	}

	/// Scopes the collection to a context; documents of different contexts
	/// never mix.
	pub fn with_context(mut self, context: impl Into<DocumentId>) -> Self {
		self.context = Some(context.into());
		self
	}

	pub fn without_get(mut self) -> Self {
		self.supports_get = false;
		self
	}

	/// Table key of the collection; contextual collections are prefixed.
	fn key(&self) -> String {
		self.path()
	}

	fn not_found(&self, id: &DocumentId) -> DbError {
		DbError::NotFound(format!("No record found for id '{id}' in {}", self.collection))
	}

	fn decode(body: &str) -> Result<Document, DbError> {
		match serde_json::from_str(body)? {
			Value::Object(document) => Ok(document),
			_ => Err(DbError::Internal("stored document is not an object".to_string())),
		}
	}

	#[tracing::instrument(skip(self), fields(collection = %self.collection))]
	async fn load_all(&self) -> Result<Vec<Document>, DbError> {
		let rows = sqlx::query(
			r#"
			SELECT body FROM documents
			WHERE collection = ?
			ORDER BY created_at, rowid
			"#,
		)
		.bind(self.key())
		.fetch_all(&self.pool)
		.await?;

		rows.iter()
			.map(|row| Self::decode(&row.get::<String, _>("body")))
			.collect()
	}

	#[tracing::instrument(skip(self, id), fields(collection = %self.collection, id = %id))]
	async fn load(&self, id: &DocumentId) -> Result<Document, DbError> {
		let row = sqlx::query(
			r#"
			SELECT body FROM documents
			WHERE collection = ? AND id = ?
			"#,
		)
		.bind(self.key())
		.bind(id.as_str())
		.fetch_optional(&self.pool)
		.await?;

		match row {
			Some(row) => Self::decode(&row.get::<String, _>("body")),
			None => Err(self.not_found(id)),
		}
	}

	#[tracing::instrument(skip(self, document), fields(collection = %self.collection))]
	async fn insert(&self, mut document: Document) -> Result<Document, DbError> {
		let id = DocumentId::of(&document).unwrap_or_else(DocumentId::generate);
		document.insert(ID_FIELD.to_string(), id.clone().into());
		let now = Utc::now().to_rfc3339();

		let result = sqlx::query(
			r#"
			INSERT INTO documents (collection, id, body, created_at, updated_at)
			VALUES (?, ?, ?, ?, ?)
			"#,
		)
		.bind(self.key())
		.bind(id.as_str())
		.bind(serde_json::to_string(&document)?)
		.bind(&now)
		.bind(&now)
		.execute(&self.pool)
		.await;

		match result {
			Ok(_) => {
				tracing::debug!(id = %id, "document created");
				Ok(document)
			}
			Err(sqlx::Error::Database(e)) if e.is_unique_violation() => Err(DbError::Conflict(
				format!("Duplicate id '{id}' in {}", self.collection),
			)),
			Err(e) => Err(e.into()),
		}
	}

	#[tracing::instrument(skip(self, id, document), fields(collection = %self.collection, id = %id))]
	async fn replace(&self, id: &DocumentId, mut document: Document) -> Result<Document, DbError> {
		document.insert(ID_FIELD.to_string(), id.clone().into());
		let result = sqlx::query(
			r#"
			UPDATE documents SET body = ?, updated_at = ?
			WHERE collection = ? AND id = ?
			"#,
		)
		.bind(serde_json::to_string(&document)?)
		.bind(Utc::now().to_rfc3339())
		.bind(self.key())
		.bind(id.as_str())
		.execute(&self.pool)
		.await?;

		if result.rows_affected() == 0 {
			return Err(self.not_found(id));
		}
		Ok(document)
	}

	#[tracing::instrument(skip(self, id), fields(collection = %self.collection, id = %id))]
	async fn delete(&self, id: &DocumentId) -> Result<Document, DbError> {
		let document = self.load(id).await?;
		sqlx::query("DELETE FROM documents WHERE collection = ? AND id = ?")
			.bind(self.key())
			.bind(id.as_str())
			.execute(&self.pool)
			.await?;
		Ok(document)
	}
}

#[async_trait]
impl ResourceService for SqliteDocumentService {
	fn name(&self) -> &str {
		&self.collection
	}

	fn context(&self) -> Option<&DocumentId> {
		self.context.as_ref()
	}

	fn supports_get(&self) -> bool {
		self.supports_get
	}

	async fn find(&self, params: &Params) -> Result<Page, AuthError> {
		let matching = self
			.load_all()
			.await?
			.into_iter()
			.filter(|document| query::matches(document, &params.query))
			.collect();
		Ok(paginate(matching, &params.query))
	}

	async fn get(&self, id: &DocumentId, _params: &Params) -> Result<Document, AuthError> {
		Ok(self.load(id).await?)
	}

	async fn create(&self, data: Document, _params: &Params) -> Result<Document, AuthError> {
		Ok(self.insert(data).await?)
	}

	async fn update(
		&self,
		id: &DocumentId,
		data: Document,
		_params: &Params,
	) -> Result<Document, AuthError> {
		Ok(self.replace(id, data).await?)
	}

	async fn patch(
		&self,
		id: &DocumentId,
		data: Document,
		_params: &Params,
	) -> Result<Document, AuthError> {
		let mut document = self.load(id).await?;
		for (key, value) in data {
			if key != ID_FIELD {
				document.insert(key, value);
			}
		}
		Ok(self.replace(id, document).await?)
	}

	async fn remove(&self, id: &DocumentId, _params: &Params) -> Result<Document, AuthError> {
		Ok(self.delete(id).await?)
	}
}

impl std::fmt::Debug for SqliteDocumentService {
	fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
		f.debug_struct("SqliteDocumentService")
			.field("collection", &self.collection)
			.field("context", &self.context)
			.finish()
	}
}
