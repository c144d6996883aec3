mod common;

use common::{Course, Module, User};
use serde_json::json;
use sphinx_db::{json::to_json_array, Entity, Error, Result};

#[test]
fn test_to_json_emits_every_column() {
    let course = Course { id: 3, title: "Algebra".to_string(), description: None, owner_id: None, modules: None };

    assert_eq!(course.to_json(), json!({ "id": 3, "title": "Algebra", "description": null, "owner_id": null }));
}

#[test]
fn test_from_json_reads_optional_and_required_fields() -> Result<()> {
    let course = Course::from_json(&json!({ "title": "Algebra", "description": null }))?;

    assert_eq!(course.title, "Algebra");
    assert_eq!(course.description, None);
    assert_eq!(course.owner_id, None);
    assert_eq!(course.id, 0);

    let module = Module::from_json(&json!({ "title": "Limits", "description": "epsilon-delta", "course_id": 4 }))?;
    assert_eq!(module.course_id, Some(4));
    assert_eq!(module.description.as_deref(), Some("epsilon-delta"));
    Ok(())
}

#[test]
fn test_client_primary_key_is_ignored() -> Result<()> {
    let course = Course::from_json(&json!({ "id": 999, "title": "Algebra" }))?;
    assert_eq!(course.id, 0);
    Ok(())
}

#[test]
fn test_round_trip_of_non_key_fields() -> Result<()> {
    let mut user = common::user("ada");
    user.student_id = Some("S-1815".to_string());

    let back = User::from_json(&user.to_json())?;
    assert_eq!(back.firstname, user.firstname);
    assert_eq!(back.lastname, user.lastname);
    assert_eq!(back.username, user.username);
    assert_eq!(back.student_id, user.student_id);
    assert_eq!(back.email, user.email);
    assert_eq!(back.role, user.role);
    Ok(())
}

#[test]
fn test_missing_required_field() {
    let err = Course::from_json(&json!({ "description": "no title" })).unwrap_err();
    assert!(matches!(err, Error::Validation(ref msg) if msg.contains("courses.title")), "{}", err);
}

#[test]
fn test_null_required_field() {
    let err = Course::from_json(&json!({ "title": null })).unwrap_err();
    assert!(matches!(err, Error::Validation(_)), "{}", err);
}

#[test]
fn test_wrong_type() {
    assert!(matches!(Course::from_json(&json!({ "title": 42 })), Err(Error::Validation(_))));
    assert!(matches!(Course::from_json(&json!({ "title": "A", "owner_id": "seven" })), Err(Error::Validation(_))));
    assert!(matches!(Course::from_json(&json!({ "title": "A", "owner_id": -1 })), Err(Error::Validation(_))));
}

#[test]
fn test_non_object_input() {
    for input in [json!([1, 2]), json!("Algebra"), json!(null), json!(7)] {
        assert!(matches!(Course::from_json(&input), Err(Error::Validation(_))), "{}", input);
    }
}

#[test]
fn test_unknown_keys_are_ignored() -> Result<()> {
    let course = Course::from_json(&json!({ "title": "Algebra", "credits": 6, "modules": [] }))?;
    assert_eq!(course.title, "Algebra");
    assert_eq!(course.modules, None);
    Ok(())
}

#[test]
fn test_json_array() {
    let modules = vec![
        Module { id: 1, course_id: Some(2), title: "Limits".to_string(), description: None },
        Module { id: 2, course_id: Some(2), title: "Series".to_string(), description: None },
    ];

    assert_eq!(
        to_json_array(&modules),
        json!([
            { "id": 1, "course_id": 2, "title": "Limits", "description": null },
            { "id": 2, "course_id": 2, "title": "Series", "description": null },
        ])
    );
    assert_eq!(to_json_array::<Module>(&[]), json!([]));
}
