use sphinx_db::Database;

mod config;
mod database;
mod handlers;
mod server;

#[derive(Clone)]
pub struct AppState {
	db: Database,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
	dotenvy::dotenv().ok();
	env_logger::init();

	let config = config::Config::from_env()?;
	let db = database::initialize(&config).await?;

	server::start_http(AppState { db }, &config).await?;
	Ok(())
}
