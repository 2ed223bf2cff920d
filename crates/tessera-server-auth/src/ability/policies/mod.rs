// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Built-in ability hooks.

pub mod resources;
pub mod users;

pub use resources::{define_resource_rules, ScopeAbilities};
pub use users::UserAbilities;
