// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

mod authorisation;
mod database;
mod logging;

pub use authorisation::{AuthorisationConfig, AuthorisationConfigLayer};
pub use database::{DatabaseConfig, DatabaseConfigLayer};
pub use logging::{LoggingConfig, LoggingConfigLayer};
