use sphinx_db::{Database, Registry};

use crate::{
	config::Config,
	database::model::{Course, Module, User},
};

/// Every entity the service persists. Building it validates keys and relations.
pub fn registry() -> Result<Registry, sphinx_db::Error> {
	Registry::builder()
		.register::<User>()
		.register::<Course>()
		.register::<Module>()
		.build()
}

pub async fn initialize(config: &Config) -> Result<Database, Box<dyn std::error::Error>> {
	let registry = registry()?;

	let mut builder = Database::builder()
		.max_connections(config.max_connections)
		.log_target("sphinx_backend::db");
	if let Some(limit) = config.query_timeout {
		builder = builder.query_timeout(limit);
	}

	let db = builder.connect(&config.database_url, registry).await?;
	Ok(db)
}
