use super::{found, none_if_blank};
use crate::db::get_db_pool;
use crate::middleware::ClientCtx;
use crate::orm::users;
use crate::session::{forget, remember};
use crate::url::profile_url;
use crate::user::{find_auth_by_name, hash_password, is_unique_violation, verify_password};
use actix_session::Session;
use actix_web::{error, get, post, web, Error, HttpResponse, Responder};
use askama_actix::{Template, TemplateToResponse};
use chrono::Utc;
use sea_orm::entity::*;
use serde::Deserialize;

pub(super) fn configure(conf: &mut actix_web::web::ServiceConfig) {
    conf.service(view_login)
        .service(post_login)
        .service(view_logout)
        .service(create_user_get)
        .service(create_user_post);
}

#[derive(Template)]
#[template(path = "login.html")]
pub struct LoginTemplate {
    pub client: ClientCtx,
    pub username: String,
    pub errors: Vec<String>,
}

#[derive(Template)]
#[template(path = "create_user.html")]
pub struct CreateUserTemplate {
    pub client: ClientCtx,
    pub username: String,
    pub email: String,
    pub errors: Vec<String>,
}

#[derive(Deserialize)]
pub struct LoginFormData {
    username: String,
    password: String,
}

#[derive(Deserialize)]
pub struct CreateUserFormData {
    username: String,
    #[serde(default)]
    email: String,
    password: String,
}

pub fn validate_new_user(username: &str, password: &str) -> Vec<String> {
    let mut errors = Vec::new();
    if username.is_empty() {
        errors.push("Username is required.".to_owned());
    } else if username.chars().count() > 150 {
        errors.push("Username is limited to 150 characters.".to_owned());
    }
    if password.chars().count() < 8 {
        errors.push("Password must be at least 8 characters.".to_owned());
    }
    errors
}

#[get("/login")]
async fn view_login(client: ClientCtx) -> impl Responder {
    LoginTemplate {
        client,
        username: String::new(),
        errors: Vec::new(),
    }
    .to_response()
}

#[post("/login")]
async fn post_login(
    client: ClientCtx,
    session: Session,
    form: web::Form<LoginFormData>,
) -> Result<HttpResponse, Error> {
    let form = form.into_inner();
    let auth = find_auth_by_name(get_db_pool(), form.username.trim())
        .await
        .map_err(error::ErrorInternalServerError)?;

    // One message for both misses so the form can't be used to probe
    // which usernames exist.
    let auth = match auth {
        Some(auth) if verify_password(&form.password, &auth.password) => auth,
        _ => {
            return Ok(LoginTemplate {
                client,
                username: form.username,
                errors: vec!["Unrecognized username or password.".to_owned()],
            }
            .to_response())
        }
    };

    remember(&session, auth.id);
    Ok(found("/".to_owned()))
}

#[get("/logout")]
async fn view_logout(session: Session) -> impl Responder {
    forget(&session);
    found("/".to_owned())
}

#[get("/register")]
async fn create_user_get(client: ClientCtx) -> impl Responder {
    CreateUserTemplate {
        client,
        username: String::new(),
        email: String::new(),
        errors: Vec::new(),
    }
    .to_response()
}

#[post("/register")]
async fn create_user_post(
    client: ClientCtx,
    session: Session,
    form: web::Form<CreateUserFormData>,
) -> Result<HttpResponse, Error> {
    let form = form.into_inner();
    let username = form.username.trim().to_owned();

    let errors = validate_new_user(&username, &form.password);
    if !errors.is_empty() {
        return Ok(CreateUserTemplate {
            client,
            username,
            email: form.email,
            errors,
        }
        .to_response());
    }

    let password = hash_password(&form.password).map_err(error::ErrorInternalServerError)?;

    let result = users::Entity::insert(users::ActiveModel {
        created_at: Set(Utc::now().naive_utc()),
        name: Set(username.clone()),
        password: Set(password),
        email: Set(none_if_blank(&form.email)),
        ..Default::default()
    })
    .exec(get_db_pool())
    .await;

    match result {
        Ok(res) => {
            remember(&session, res.last_insert_id);
            Ok(found(profile_url(&username)))
        }
        Err(e) if is_unique_violation(&e) => Ok(CreateUserTemplate {
            client,
            username,
            email: form.email,
            errors: vec!["That username is taken.".to_owned()],
        }
        .to_response()),
        Err(e) => Err(error::ErrorInternalServerError(e)),
    }
}
