// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Ability engine: rules contributed by hooks, evaluated per subject.

mod engine;
pub mod policies;
mod set;
mod types;

pub use engine::{hook, AbilityEngine, AbilityHook};
pub use set::{AbilityBuilder, AbilitySet, CONTEXT_FIELD};
pub use types::{Action, IntoActions, Rule};
