// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

use sqlx::sqlite::{SqlitePool, SqlitePoolOptions};

use crate::error::DbError;
use crate::pool::run_migrations;

/// In-memory database with the document table in place.
///
/// A single connection is kept so every query sees the same database.
pub async fn create_test_pool() -> Result<SqlitePool, DbError> {
	let pool = SqlitePoolOptions::new()
		.max_connections(1)
		.connect("sqlite::memory:")
		.await?;
	run_migrations(&pool).await?;
	Ok(pool)
}
