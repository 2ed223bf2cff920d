// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Tessera server administration binary.

use std::path::PathBuf;

use anyhow::Context;
use clap::{Parser, Subcommand};
use serde_json::json;
use tessera_server::{telemetry, App};
use tessera_server_auth::{Document, DocumentId, Operation, Params};

/// Tessera server - authorised document services.
#[derive(Parser, Debug)]
#[command(name = "tessera-server", about = "Tessera authorisation server", version)]
struct Args {
	/// Config file to read instead of /etc/tessera/server.toml
	#[arg(long, env = "TESSERA_SERVER_CONFIG")]
	config: Option<PathBuf>,

	#[command(subcommand)]
	command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
	/// Apply database migrations
	Migrate,
	/// Print the resolved configuration
	CheckConfig,
	/// Grant a role on a resource to a subject
	Grant {
		#[command(flatten)]
		target: Target,
		/// member, manager or owner
		#[arg(long)]
		permissions: String,
	},
	/// Revoke a subject's role on a resource
	Revoke {
		#[command(flatten)]
		target: Target,
	},
}

#[derive(clap::Args, Debug)]
struct Target {
	/// Scope list the role is stored in
	#[arg(long)]
	scope: String,
	#[arg(long)]
	subject: String,
	#[arg(long, default_value = "users")]
	subjects_service: String,
	#[arg(long)]
	resource: String,
	#[arg(long)]
	resources_service: String,
	/// Context of the resources service, if contextual
	#[arg(long)]
	context: Option<String>,
}

impl Target {
	fn register(&self, app: &App, pool: &tessera_server_db::SqlitePool) -> String {
		app.register_collection(pool, &self.subjects_service, None, false);
		let context = self.context.as_deref().map(DocumentId::from);
		app.register_collection(pool, &self.resources_service, context.as_ref(), false)
			.path()
	}
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
	let args = Args::parse();

	let config = match &args.config {
		Some(path) => tessera_server_config::load_config_with_file(path.clone()),
		None => tessera_server_config::load_config(),
	}
	.context("failed to load configuration")?;

	if let Err(e) = telemetry::init_tracing(&config.logging) {
		eprintln!("tracing already initialised: {e}");
	}

	if let Command::CheckConfig = args.command {
		println!("{config:#?}");
		return Ok(());
	}

	tracing::info!(database = %config.database.url, "starting tessera-server");
	let pool = tessera_server_db::create_pool(&config.database.url, config.database.max_connections)
		.await
		.context("failed to open database")?;
	tessera_server_db::run_migrations(&pool)
		.await
		.context("failed to apply migrations")?;

	let app = App::new(config);
	match args.command {
		Command::Migrate | Command::CheckConfig => {}
		Command::Grant {
			target,
			permissions,
		} => {
			let resources_service = target.register(&app, &pool);
			let data = json!({
				"scope": target.scope,
				"permissions": permissions,
				"subjects": [target.subject],
				"subjectsService": target.subjects_service,
				"resource": target.resource,
				"resourcesService": resources_service,
			});
			let data: Document = data.as_object().cloned().unwrap_or_default();
			let result = app
				.call("authorisations", Operation::create(data, Params::internal()))
				.await
				.context("grant failed")?;
			println!("{}", serde_json::to_string_pretty(&result.into_item())?);
		}
		Command::Revoke { target } => {
			let resources_service = target.register(&app, &pool);
			let query = json!({
				"scope": target.scope,
				"subjects": [target.subject],
				"subjectsService": target.subjects_service,
				"resourcesService": resources_service,
			});
			let query: Document = query.as_object().cloned().unwrap_or_default();
			let operation = Operation::remove(
				target.resource.as_str(),
				Params::internal().with_query(query),
			);
			let result = app
				.call("authorisations", operation)
				.await
				.context("revoke failed")?;
			println!("{}", serde_json::to_string_pretty(&result.into_item())?);
		}
	}

	Ok(())
}
