// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Compiled-in message catalog.

use std::collections::HashMap;

use once_cell::sync::Lazy;
use tracing::debug;

use crate::locale::DEFAULT_LOCALE;

type Messages = HashMap<&'static str, &'static str>;

const EN: &[(&str, &str)] = &[
	(
		"server.auth.forbidden.service",
		"You are not allowed to access this service",
	),
	(
		"server.auth.forbidden.service_path",
		"You are not allowed to access service {path}",
	),
	(
		"server.auth.forbidden.operation",
		"You are not allowed to perform {method} operation on service {path}",
	),
	(
		"server.auth.forbidden.authorisation_user",
		"An authenticated user is required to change authorisations",
	),
	(
		"server.auth.forbidden.authorisation_resource",
		"You are not allowed to change authorisations on resource {resource}",
	),
	(
		"server.auth.forbidden.authorisation_subjects",
		"You are not allowed to change authorisations of {count} subject(s) on resource {resource}",
	),
	(
		"server.auth.forbidden.authorisation_permissions",
		"You are not allowed to grant {permissions} permissions on resource {resource}",
	),
	(
		"server.auth.bad_request.invalid_permissions",
		"Invalid permissions {permissions}",
	),
	(
		"server.auth.bad_request.missing_field",
		"Missing required field {field}",
	),
	(
		"server.auth.bad_request.method_not_allowed",
		"Method {method} is not allowed on service {path}",
	),
	(
		"server.tags.missing_value_or_scope",
		"Tag value and scope are required",
	),
	(
		"server.tags.missing_context",
		"No tag service found for context {context}",
	),
];

const ES: &[(&str, &str)] = &[
	(
		"server.auth.forbidden.service",
		"No tiene permiso para acceder a este servicio",
	),
	(
		"server.auth.forbidden.service_path",
		"No tiene permiso para acceder al servicio {path}",
	),
	(
		"server.auth.forbidden.operation",
		"No tiene permiso para realizar la operación {method} en el servicio {path}",
	),
	(
		"server.auth.forbidden.authorisation_user",
		"Se requiere un usuario autenticado para modificar autorizaciones",
	),
	(
		"server.auth.forbidden.authorisation_resource",
		"No tiene permiso para modificar las autorizaciones del recurso {resource}",
	),
	(
		"server.auth.forbidden.authorisation_subjects",
		"No tiene permiso para modificar las autorizaciones de {count} sujeto(s) en el recurso {resource}",
	),
	(
		"server.auth.forbidden.authorisation_permissions",
		"No tiene permiso para otorgar permisos {permissions} en el recurso {resource}",
	),
	(
		"server.auth.bad_request.invalid_permissions",
		"Permisos no válidos {permissions}",
	),
	(
		"server.auth.bad_request.missing_field",
		"Falta el campo obligatorio {field}",
	),
	(
		"server.auth.bad_request.method_not_allowed",
		"El método {method} no está permitido en el servicio {path}",
	),
	(
		"server.tags.missing_value_or_scope",
		"El valor y el ámbito de la etiqueta son obligatorios",
	),
	(
		"server.tags.missing_context",
		"No se encontró un servicio de etiquetas para el contexto {context}",
	),
];

static CATALOG: Lazy<HashMap<&'static str, Messages>> = Lazy::new(|| {
	let mut catalog = HashMap::new();
	catalog.insert("en", EN.iter().copied().collect::<Messages>());
	catalog.insert("es", ES.iter().copied().collect::<Messages>());
	catalog
});

fn lookup(locale: &str, key: &str) -> Option<&'static str> {
	CATALOG
		.get(locale)
		.and_then(|messages| messages.get(key))
		.copied()
}

/// Returns true when the default catalog defines `key`.
pub fn has_key(key: &str) -> bool {
	lookup(DEFAULT_LOCALE, key).is_some()
}

/// Translate `key` into `locale`.
///
/// Falls back to the default locale, then to the key itself.
pub fn t(locale: &str, key: &str) -> String {
	match lookup(locale, key).or_else(|| lookup(DEFAULT_LOCALE, key)) {
		Some(message) => message.to_string(),
		None => {
			debug!(locale, key, "missing translation");
			key.to_string()
		}
	}
}

/// Translate `key` and substitute `{name}` placeholders.
pub fn t_fmt(locale: &str, key: &str, args: &[(&str, &str)]) -> String {
	args.iter().fold(t(locale, key), |message, (name, value)| {
		message.replace(&format!("{{{name}}}"), value)
	})
}
