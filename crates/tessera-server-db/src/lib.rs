// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! SQLite storage for Tessera document services.

pub mod document;
pub mod error;
pub mod pool;
pub mod testing;

pub use document::SqliteDocumentService;
pub use error::{DbError, Result};
pub use pool::{create_pool, run_migrations};
pub use sqlx::sqlite::SqlitePool;
