use axum::{
	http::StatusCode,
	response::{IntoResponse, Response},
	Json,
};
use serde_json::{json, Value};
use sphinx_db::{Error, Outcome};

pub mod courses;
pub mod modules;
pub mod users;

pub struct ApiError(Error);

impl From<Error> for ApiError {
	fn from(e: Error) -> Self {
		ApiError(e)
	}
}

impl IntoResponse for ApiError {
	fn into_response(self) -> Response {
		let status = match &self.0 {
			Error::Validation(_) => StatusCode::BAD_REQUEST,
			Error::NotFound { .. } => StatusCode::NOT_FOUND,
			Error::Timeout(_) => StatusCode::GATEWAY_TIMEOUT,
			_ => StatusCode::INTERNAL_SERVER_ERROR,
		};
		if status.is_server_error() {
			log::error!("request failed: {}", self.0);
		}

		(status, Json(json!({ "error": self.0.to_string() }))).into_response()
	}
}

/// 201 when every item (and its children) was created, 207 when some were
/// not, 204 for an empty batch.
pub fn created(outcomes: Vec<Outcome>) -> Response {
	if outcomes.is_empty() {
		return StatusCode::NO_CONTENT.into_response();
	}
	let status = if outcomes.iter().all(Outcome::is_success) { StatusCode::CREATED } else { StatusCode::MULTI_STATUS };
	let body: Vec<Value> = outcomes.iter().map(Outcome::to_json).collect();

	(status, Json(Value::Array(body))).into_response()
}

#[cfg(test)]
mod tests {
	use std::time::Duration;

	use axum::body::to_bytes;
	use sphinx_db::SqlValue;

	use super::*;

	fn ok(table: &'static str, id: i64, children: Vec<Outcome>) -> Outcome {
		Outcome { table, result: Ok(SqlValue::BigInt(id)), children }
	}

	fn failed(table: &'static str, message: &str) -> Outcome {
		Outcome { table, result: Err(Error::Query(message.to_string())), children: Vec::new() }
	}

	async fn body_of(response: Response) -> Result<Value, Box<dyn std::error::Error>> {
		let bytes = to_bytes(response.into_body(), usize::MAX).await?;
		Ok(serde_json::from_slice(&bytes)?)
	}

	#[tokio::test]
	async fn test_created_all_succeeded() -> Result<(), Box<dyn std::error::Error>> {
		let response = created(vec![ok("courses", 1, vec![ok("modules", 1, Vec::new())]), ok("courses", 2, Vec::new())]);

		assert_eq!(response.status(), StatusCode::CREATED);
		let body = body_of(response).await?;
		assert_eq!(body[0]["id"], json!(1));
		assert_eq!(body[0]["children"][0]["table"], json!("modules"));
		assert_eq!(body[1]["id"], json!(2));
		Ok(())
	}

	#[tokio::test]
	async fn test_created_mixed_is_multi_status() -> Result<(), Box<dyn std::error::Error>> {
		let response = created(vec![failed("courses", "duplicate key"), ok("courses", 2, Vec::new())]);

		assert_eq!(response.status(), StatusCode::MULTI_STATUS);
		let body = body_of(response).await?;
		assert_eq!(body[0]["error"], json!("query failed: duplicate key"));
		assert_eq!(body[1]["id"], json!(2));
		Ok(())
	}

	#[test]
	fn test_created_failed_child_is_multi_status() {
		let response = created(vec![ok("courses", 1, vec![failed("modules", "disk full")])]);
		assert_eq!(response.status(), StatusCode::MULTI_STATUS);
	}

	#[test]
	fn test_created_empty_batch() {
		assert_eq!(created(Vec::new()).status(), StatusCode::NO_CONTENT);
	}

	#[test]
	fn test_error_status_codes() {
		let cases = [
			(Error::Validation("courses.title is required".to_string()), StatusCode::BAD_REQUEST),
			(Error::NotFound { table: "courses", id: "7".to_string() }, StatusCode::NOT_FOUND),
			(Error::Timeout(Duration::from_millis(20)), StatusCode::GATEWAY_TIMEOUT),
			(Error::Query("connection reset by peer".to_string()), StatusCode::INTERNAL_SERVER_ERROR),
			(Error::Consistency("2 rows".to_string()), StatusCode::INTERNAL_SERVER_ERROR),
			(Error::Schema("courses is not registered".to_string()), StatusCode::INTERNAL_SERVER_ERROR),
		];
		for (error, status) in cases {
			assert_eq!(ApiError::from(error).into_response().status(), status);
		}
	}

	#[tokio::test]
	async fn test_driver_message_reaches_client() -> Result<(), Box<dyn std::error::Error>> {
		let response = ApiError::from(Error::Query("connection reset by peer".to_string())).into_response();
		let body = body_of(response).await?;
		assert_eq!(body, json!({ "error": "query failed: connection reset by peer" }));
		Ok(())
	}
}
