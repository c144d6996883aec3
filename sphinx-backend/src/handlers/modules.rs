use axum::{
	extract::{Path, State},
	response::Response,
	Json,
};
use serde_json::Value;
use sphinx_db::json::to_json_array;

use super::{created, ApiError};
use crate::{
	database::model::{Course, Module},
	AppState,
};

pub async fn list_modules(State(state): State<AppState>) -> Result<Json<Value>, ApiError> {
	let modules = state.db.model::<Module>().list().await?;
	Ok(Json(to_json_array(&modules)))
}

pub async fn create_modules(State(state): State<AppState>, Json(body): Json<Value>) -> Result<Response, ApiError> {
	log::debug!("POST /modules {}", body);
	let outcomes = state.db.model::<Module>().create(&body).await?;
	Ok(created(outcomes))
}

pub async fn list_course_modules(State(state): State<AppState>, Path(course_id): Path<u64>) -> Result<Json<Value>, ApiError> {
	state.db.model::<Course>().get(&course_id).await?;
	let modules = state.db.model::<Module>().find_by_column(Module::COURSE_ID, course_id).await?;
	Ok(Json(to_json_array(&modules)))
}

pub async fn create_course_modules(
	State(state): State<AppState>,
	Path(course_id): Path<u64>,
	Json(mut body): Json<Value>,
) -> Result<Response, ApiError> {
	log::debug!("POST /courses/{}/modules {}", course_id, body);
	state.db.model::<Course>().get(&course_id).await?;
	assign_course_id(&mut body, course_id);
	let outcomes = state.db.model::<Module>().create(&body).await?;
	Ok(created(outcomes))
}

/// Modules posted under a course belong to that course, whatever the body says.
fn assign_course_id(body: &mut Value, course_id: u64) {
	match body {
		Value::Array(items) => items.iter_mut().for_each(|item| assign_course_id(item, course_id)),
		Value::Object(obj) => {
			obj.insert("course_id".to_string(), Value::from(course_id));
		}
		_ => {}
	}
}

#[cfg(test)]
mod tests {
	use std::sync::{Arc, Mutex};

	use axum::{http::StatusCode, response::IntoResponse};
	use futures::future::BoxFuture;
	use serde_json::json;
	use sphinx_db::{Connection, Database, QueryResult, Registry, SqlValue};

	use super::*;
	use crate::database::model::User;

	/// Answers every statement with an empty result set and remembers it.
	#[derive(Default)]
	struct EmptyTables {
		statements: Mutex<Vec<String>>,
	}

	impl Connection for EmptyTables {
		fn execute<'a>(&'a self, sql: &'a str, _params: &'a [SqlValue]) -> BoxFuture<'a, QueryResult> {
			Box::pin(async move {
				self.statements.lock().unwrap().push(sql.to_string());
				let fields = ["id", "title", "description", "owner_id"].iter().map(|f| f.to_string()).collect();
				QueryResult::with_rows(fields, Vec::new())
			})
		}
	}

	fn state(conn: Arc<EmptyTables>) -> Result<AppState, sphinx_db::Error> {
		let registry = Registry::builder().register::<User>().register::<Course>().register::<Module>().build()?;
		Ok(AppState { db: Database::builder().with_connection(conn, registry) })
	}

	#[tokio::test]
	async fn test_create_under_missing_course_is_not_found() -> Result<(), Box<dyn std::error::Error>> {
		let conn = Arc::new(EmptyTables::default());
		let body = json!({ "title": "M1" });

		let response = match create_course_modules(State(state(conn.clone())?), Path(7), Json(body)).await {
			Ok(_) => panic!("course 7 does not exist"),
			Err(e) => e.into_response(),
		};

		assert_eq!(response.status(), StatusCode::NOT_FOUND);
		let statements = conn.statements.lock().unwrap();
		assert_eq!(statements.len(), 1);
		assert!(statements[0].starts_with("SELECT"));
		Ok(())
	}

	#[tokio::test]
	async fn test_list_under_missing_course_is_not_found() -> Result<(), Box<dyn std::error::Error>> {
		let conn = Arc::new(EmptyTables::default());

		let response = match list_course_modules(State(state(conn)?), Path(7)).await {
			Ok(_) => panic!("course 7 does not exist"),
			Err(e) => e.into_response(),
		};
		assert_eq!(response.status(), StatusCode::NOT_FOUND);
		Ok(())
	}

	#[test]
	fn test_path_course_overrides_body() {
		let mut body = json!({ "title": "M1", "course_id": 5 });
		assign_course_id(&mut body, 7);
		assert_eq!(body["course_id"], json!(7));
	}

	#[test]
	fn test_missing_or_null_course_is_filled() {
		let mut body = json!([{ "title": "M1" }, { "title": "M2", "course_id": null }, { "title": "M3", "course_id": 9 }]);
		assign_course_id(&mut body, 7);
		assert_eq!(body, json!([
			{ "title": "M1", "course_id": 7 },
			{ "title": "M2", "course_id": 7 },
			{ "title": "M3", "course_id": 7 },
		]));
	}

	#[test]
	fn test_non_object_items_are_left_alone() {
		let mut body = json!(["M1", 3]);
		assign_course_id(&mut body, 7);
		assert_eq!(body, json!(["M1", 3]));
	}
}
