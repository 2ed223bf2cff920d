// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Partial configuration layer merged from every source.

use serde::Deserialize;

use crate::sections::{AuthorisationConfigLayer, DatabaseConfigLayer, LoggingConfigLayer};

/// One source's view of the configuration; unset fields defer to lower layers.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct ServerConfigLayer {
	#[serde(default)]
	pub authorisation: Option<AuthorisationConfigLayer>,
	#[serde(default)]
	pub database: Option<DatabaseConfigLayer>,
	#[serde(default)]
	pub logging: Option<LoggingConfigLayer>,
}

impl ServerConfigLayer {
	/// Overlay `other` on top of `self`.
	pub fn merge(&mut self, other: ServerConfigLayer) {
		merge_section(&mut self.authorisation, other.authorisation, |a, b| {
			a.merge(b)
		});
		merge_section(&mut self.database, other.database, |a, b| a.merge(b));
		merge_section(&mut self.logging, other.logging, |a, b| a.merge(b));
	}
}

fn merge_section<T>(base: &mut Option<T>, other: Option<T>, merge: impl FnOnce(&mut T, T)) {
	match (base.as_mut(), other) {
		(Some(existing), Some(overlay)) => merge(existing, overlay),
		(None, Some(overlay)) => *base = Some(overlay),
		(_, None) => {}
	}
}
