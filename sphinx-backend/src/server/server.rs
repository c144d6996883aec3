use axum::{routing::get, Router};

use crate::{
	config::Config,
	handlers::{courses, modules, users},
	AppState,
};

pub fn router(config: &Config) -> Router<AppState> {
	let api = Router::new()
		.route("/users", get(users::list_users).post(users::create_users))
		.route("/users/{id}", get(users::get_user))
		.route("/users/{id}/exists", get(users::user_exists))
		.route("/users_search/{username}", get(users::search_users))
		.route("/courses", get(courses::list_courses).post(courses::create_courses))
		.route("/courses/{id}", get(courses::get_course))
		.route("/courses/{id}/modules", get(modules::list_course_modules).post(modules::create_course_modules))
		.route("/modules", get(modules::list_modules).post(modules::create_modules));

	Router::new().nest(&format!("/{}", config.api_version), api)
}

pub async fn start_http(a_state: AppState, config: &Config) -> Result<(), Box<dyn std::error::Error>> {
	let app = router(config).with_state(a_state);

	let listener = tokio::net::TcpListener::bind(config.bind_addr).await?;
	log::info!("listening on {} under /{}", config.bind_addr, config.api_version);
	axum::serve(listener, app).await?;
	Ok(())
}
