use axum::{
	extract::{Path, State},
	response::Response,
	Json,
};
use serde_json::Value;
use sphinx_db::{json::to_json_array, Entity};

use super::{created, ApiError};
use crate::{database::model::Course, AppState};

pub async fn list_courses(State(state): State<AppState>) -> Result<Json<Value>, ApiError> {
	let courses = state.db.model::<Course>().list().await?;
	Ok(Json(to_json_array(&courses)))
}

pub async fn get_course(State(state): State<AppState>, Path(id): Path<u64>) -> Result<Json<Value>, ApiError> {
	let course = state.db.model::<Course>().get(&id).await?;
	Ok(Json(course.to_json()))
}

/// Accepts a course or an array of courses, each with an optional nested
/// `modules` array.
pub async fn create_courses(State(state): State<AppState>, Json(body): Json<Value>) -> Result<Response, ApiError> {
	log::debug!("POST /courses {}", body);
	let outcomes = state.db.model::<Course>().create(&body).await?;
	Ok(created(outcomes))
}
