use axum::{
	extract::{Path, State},
	response::Response,
	Json,
};
use serde::Serialize;
use serde_json::Value;
use sphinx_db::{json::to_json_array, Entity};

use super::{created, ApiError};
use crate::{database::model::User, AppState};

#[derive(Debug, Serialize)]
pub struct Exists {
	id: u64,
	exists: bool,
}

pub async fn list_users(State(state): State<AppState>) -> Result<Json<Value>, ApiError> {
	let users = state.db.model::<User>().list().await?;
	Ok(Json(to_json_array(&users)))
}

pub async fn get_user(State(state): State<AppState>, Path(id): Path<u64>) -> Result<Json<Value>, ApiError> {
	let user = state.db.model::<User>().get(&id).await?;
	Ok(Json(user.to_json()))
}

pub async fn user_exists(State(state): State<AppState>, Path(id): Path<u64>) -> Result<Json<Exists>, ApiError> {
	let exists = state.db.model::<User>().exists(&id).await?;
	Ok(Json(Exists { id, exists }))
}

pub async fn search_users(State(state): State<AppState>, Path(username): Path<String>) -> Result<Json<Value>, ApiError> {
	let users = state.db.model::<User>().find_by_column(User::USERNAME, username).await?;
	Ok(Json(to_json_array(&users)))
}

pub async fn create_users(State(state): State<AppState>, Json(body): Json<Value>) -> Result<Response, ApiError> {
	log::debug!("POST /users {}", body);
	let outcomes = state.db.model::<User>().create(&body).await?;
	Ok(created(outcomes))
}
