use rocket::http::Status;
use rocket::serde::json::{Json, Value, json};
use rocket::{Request, catch};

// Same body shape as `AppError` so clients only parse one error format.
fn body(message: &str) -> Json<Value> {
    Json(json!({ "error": message }))
}

#[catch(400)]
pub fn bad_request(_: &Request) -> Json<Value> {
    body("Bad request")
}

#[catch(401)]
pub fn unauthorized(_: &Request) -> Json<Value> {
    body("Unauthorized")
}

#[catch(404)]
pub fn not_found(_: &Request) -> Json<Value> {
    body("Not found")
}

#[catch(422)]
pub fn unprocessable_entity(_: &Request) -> Json<Value> {
    body("Invalid input: malformed request body")
}

#[catch(500)]
pub fn internal_error(_: &Request) -> Json<Value> {
    body("Internal server error")
}

#[catch(default)]
pub fn default_catcher(status: Status, _: &Request) -> Json<Value> {
    body(status.reason().unwrap_or("Error"))
}

pub fn catchers() -> Vec<rocket::Catcher> {
    rocket::catchers![bad_request, unauthorized, not_found, unprocessable_entity, internal_error, default_catcher]
}
