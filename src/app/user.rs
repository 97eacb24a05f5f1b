//! User controller and its in-memory store.

use std::sync::Arc;

use serde::{Deserialize, Serialize};
use serde_json::{Number, Value};
use tokio::sync::RwLock;
use validator::{Validate, ValidationError};

use crate::failure::Failure;
use crate::handler::Args;
use crate::pipe::{Binding, EmailPipe, ParseIntPipe, ValidationPipe};
use crate::response::Json;
use crate::router::{Controller, Route};

pub const CONTROLLER: &str = "user";

/// Body of `POST /user`. Fields stay loosely typed so every broken rule is
/// reported, not only the first type mismatch.
#[derive(Debug, Default, Deserialize, Serialize, Validate)]
#[serde(default, rename_all = "camelCase")]
pub struct CreateUserDto {
    #[validate(custom(function = "validate_id"))]
    pub id: Value,
    #[validate(custom(function = "validate_full_name"))]
    pub full_name: Value,
    #[validate(custom(function = "validate_job"))]
    pub job: Value,
}

fn rule(code: &'static str, message: &'static str) -> ValidationError {
    let mut err = ValidationError::new(code);
    err.message = Some(message.into());
    err
}

fn validate_id(id: &Value) -> Result<(), ValidationError> {
    if id.is_number() {
        Ok(())
    } else {
        Err(rule("is_number", "id should be a number"))
    }
}

fn validate_full_name(name: &Value) -> Result<(), ValidationError> {
    let Some(name) = name.as_str() else {
        return Err(rule("is_string", "full name should be a string"));
    };
    if (3..=15).contains(&name.chars().count()) {
        Ok(())
    } else {
        Err(rule("length", "full name length should be 3 to 15 characters"))
    }
}

fn validate_job(job: &Value) -> Result<(), ValidationError> {
    if job.is_string() {
        Ok(())
    } else {
        Err(rule("is_string", "job should be a string"))
    }
}

/// A stored user. `id` is any JSON number, as accepted on creation.
#[derive(Clone, Debug, Deserialize, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct User {
    pub id: Number,
    pub full_name: String,
    pub job: String,
}

/// In-memory user list. Writers are serialized by the lock.
#[derive(Debug, Default)]
pub struct UserStore {
    users: RwLock<Vec<User>>,
}

impl UserStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn find(&self) -> Vec<User> {
        self.users.read().await.clone()
    }

    pub async fn create(&self, user: User) {
        self.users.write().await.push(user);
    }

    /// First user whose id equals `id`, if any.
    pub async fn find_one(&self, id: i64) -> Option<User> {
        self.users.read().await.iter()
            .find(|u| u.id.as_i64() == Some(id) || u.id.as_f64() == Some(id as f64))
            .cloned()
    }
}

pub fn controller(store: Arc<UserStore>) -> Controller {
    let (list, show, add) = (Arc::clone(&store), Arc::clone(&store), store);
    Controller::new(CONTROLLER, "/user")
        .route(Route::get("/", move |args: Args| find(Arc::clone(&list), args)))
        .route(
            Route::post("/", move |args: Args| create(Arc::clone(&add), args))
                .bind(Binding::body().pipe(ValidationPipe::<CreateUserDto>::new())),
        )
        .route(
            Route::get("/{id}", move |args: Args| find_one(Arc::clone(&show), args))
                .bind(Binding::param("id").pipe(ParseIntPipe)),
        )
        .route(
            Route::post("/email", check_email)
                .bind(Binding::body_field("email").pipe(EmailPipe)),
        )
}

async fn find(store: Arc<UserStore>, _: Args) -> Json<Vec<User>> {
    Json(store.find().await)
}

async fn create(store: Arc<UserStore>, mut args: Args) -> Result<&'static str, Failure> {
    let user: User = args.take("body")?;
    store.create(user).await;
    Ok("user has been created successfully")
}

async fn find_one(store: Arc<UserStore>, mut args: Args) -> Result<Json<Option<User>>, Failure> {
    let id: i64 = args.take("id")?;
    Ok(Json(store.find_one(id).await))
}

async fn check_email(mut args: Args) -> Result<String, Failure> {
    args.take("email")
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;

    fn user(id: i64, name: &str) -> User {
        User { id: id.into(), full_name: name.to_owned(), job: "engineer".to_owned() }
    }

    fn dto(body: Value) -> CreateUserDto {
        serde_json::from_value(body).unwrap()
    }

    fn messages(body: Value) -> Vec<String> {
        let errors = dto(body).validate().unwrap_err();
        let mut messages: Vec<String> = errors.field_errors().values()
            .flat_map(|errs| errs.iter())
            .filter_map(|e| e.message.as_ref().map(ToString::to_string))
            .collect();
        messages.sort();
        messages
    }

    #[tokio::test]
    async fn store_finds_first_match() {
        let store = UserStore::new();
        store.create(user(1, "Ada")).await;
        store.create(user(1, "Grace")).await;
        assert_eq!(store.find().await.len(), 2);
        assert_eq!(store.find_one(1).await.map(|u| u.full_name), Some("Ada".to_owned()));
        assert_eq!(store.find_one(2).await, None);
    }

    #[test]
    fn full_name_length_is_inclusive() {
        let body = |name: &str| json!({"id": 1, "fullName": name, "job": "engineer"});
        assert!(dto(body("abc")).validate().is_ok());
        assert!(dto(body(&"a".repeat(15))).validate().is_ok());
        assert!(dto(body("ab")).validate().is_err());
        assert!(dto(body(&"a".repeat(16))).validate().is_err());
    }

    #[test]
    fn every_broken_rule_is_reported() {
        assert_eq!(
            messages(json!({"id": "abc", "fullName": "ab", "job": 5})),
            [
                "full name length should be 3 to 15 characters",
                "id should be a number",
                "job should be a string",
            ]
        );
        assert_eq!(
            messages(json!({})),
            ["full name should be a string", "id should be a number", "job should be a string"]
        );
    }

    #[test]
    fn any_json_number_is_an_id() {
        assert!(dto(json!({"id": 1.5, "fullName": "Ada", "job": "x"})).validate().is_ok());
        assert!(dto(json!({"id": -3, "fullName": "Ada", "job": "x"})).validate().is_ok());
    }
}
