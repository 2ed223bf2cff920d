// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Supported locales.

/// Locale used when neither the user nor the server configured a valid one.
pub const DEFAULT_LOCALE: &str = "en";

/// All locales with a catalog.
pub const LOCALES: &[LocaleInfo] = &[
	LocaleInfo {
		code: "en",
		name: "English",
		native_name: "English",
	},
	LocaleInfo {
		code: "es",
		name: "Spanish",
		native_name: "Español",
	},
];

/// Metadata about a supported locale.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LocaleInfo {
	pub code: &'static str,
	pub name: &'static str,
	pub native_name: &'static str,
}

pub fn is_supported(locale: &str) -> bool {
	LOCALES.iter().any(|info| info.code == locale)
}

pub fn locale_info(locale: &str) -> Option<&'static LocaleInfo> {
	LOCALES.iter().find(|info| info.code == locale)
}

pub fn available_locales() -> impl Iterator<Item = &'static str> {
	LOCALES.iter().map(|info| info.code)
}
