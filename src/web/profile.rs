use super::{found, none_if_blank, PageQuery};
use crate::db::get_db_pool;
use crate::feed::{fetch_posts_page, profile_posts, Paginated, PostForTemplate};
use crate::middleware::ClientCtx;
use crate::orm::users;
use crate::url::profile_url;
use crate::user::{find_profile_by_name, get_profile_by_id, is_unique_violation, UserProfile};
use actix_web::{error, get, post, web, Error, HttpResponse};
use askama_actix::{Template, TemplateToResponse};
use sea_orm::entity::*;
use serde::Deserialize;

pub(super) fn configure(conf: &mut actix_web::web::ServiceConfig) {
    conf.service(view_profile)
        .service(edit_profile)
        .service(update_profile);
}

#[derive(Template)]
#[template(path = "profile.html")]
pub struct ProfileTemplate {
    pub client: ClientCtx,
    pub profile: UserProfile,
    pub posts: Paginated<PostForTemplate>,
    pub page_base: String,
}

#[derive(Template)]
#[template(path = "profile_update.html")]
pub struct ProfileUpdateTemplate {
    pub client: ClientCtx,
    pub values: ProfileFormValues,
    pub errors: Vec<String>,
}

#[derive(Deserialize)]
pub struct ProfileFormData {
    pub username: String,
    #[serde(default)]
    pub email: String,
    #[serde(default)]
    pub first_name: String,
    #[serde(default)]
    pub last_name: String,
}

/// Submitted field values, kept as strings so a failed submit re-renders
/// with everything the member typed.
pub struct ProfileFormValues {
    pub username: String,
    pub email: String,
    pub first_name: String,
    pub last_name: String,
}

impl ProfileFormValues {
    fn from_form(form: &ProfileFormData) -> Self {
        Self {
            username: form.username.trim().to_owned(),
            email: form.email.trim().to_owned(),
            first_name: form.first_name.trim().to_owned(),
            last_name: form.last_name.trim().to_owned(),
        }
    }

    fn from_profile(profile: &UserProfile) -> Self {
        Self {
            username: profile.name.clone(),
            email: profile.email.clone().unwrap_or_default(),
            first_name: profile.first_name.clone().unwrap_or_default(),
            last_name: profile.last_name.clone().unwrap_or_default(),
        }
    }
}

pub fn validate_profile_form(values: &ProfileFormValues) -> Vec<String> {
    let mut errors = Vec::new();
    if values.username.is_empty() {
        errors.push("Username is required.".to_owned());
    } else if values.username.chars().count() > 150 {
        errors.push("Username is limited to 150 characters.".to_owned());
    }
    errors
}

#[get("/profile/{username}/")]
async fn view_profile(
    client: ClientCtx,
    path: web::Path<String>,
    query: web::Query<PageQuery>,
) -> Result<HttpResponse, Error> {
    let db = get_db_pool();
    let username = path.into_inner();

    let profile = find_profile_by_name(db, &username)
        .await
        .map_err(error::ErrorInternalServerError)?
        .ok_or_else(|| error::ErrorNotFound("User not found."))?;

    let posts = fetch_posts_page(db, profile_posts(profile.id), query.page())
        .await
        .map_err(error::ErrorInternalServerError)?
        .ok_or_else(|| error::ErrorNotFound("That page of posts does not exist."))?;

    Ok(ProfileTemplate {
        client,
        page_base: profile_url(&profile.name),
        profile,
        posts,
    }
    .to_response())
}

/// The path's username is decorative: members can only ever edit
/// themselves, so the requester's own profile is what loads.
#[get("/profile/{username}/edit/")]
async fn edit_profile(client: ClientCtx, _path: web::Path<String>) -> Result<HttpResponse, Error> {
    let id = match client.get_id() {
        Some(id) => id,
        None => return Ok(found("/login".to_owned())),
    };

    let profile = get_profile_by_id(get_db_pool(), id)
        .await
        .map_err(error::ErrorInternalServerError)?
        .ok_or_else(|| error::ErrorInternalServerError("Could not load profile."))?;

    Ok(ProfileUpdateTemplate {
        client,
        values: ProfileFormValues::from_profile(&profile),
        errors: Vec::new(),
    }
    .to_response())
}

#[post("/profile/{username}/edit/")]
async fn update_profile(
    client: ClientCtx,
    _path: web::Path<String>,
    form: web::Form<ProfileFormData>,
) -> Result<HttpResponse, Error> {
    let id = match client.get_id() {
        Some(id) => id,
        None => return Ok(found("/login".to_owned())),
    };

    let values = ProfileFormValues::from_form(&form);
    let errors = validate_profile_form(&values);
    if !errors.is_empty() {
        return Ok(ProfileUpdateTemplate {
            client,
            values,
            errors,
        }
        .to_response());
    }

    let result = users::ActiveModel {
        id: Set(id),
        name: Set(values.username.clone()),
        email: Set(none_if_blank(&values.email)),
        first_name: Set(none_if_blank(&values.first_name)),
        last_name: Set(none_if_blank(&values.last_name)),
        ..Default::default()
    }
    .update(get_db_pool())
    .await;

    match result {
        Ok(user) => Ok(found(profile_url(&user.name))),
        Err(e) if is_unique_violation(&e) => Ok(ProfileUpdateTemplate {
            client,
            values,
            errors: vec!["That username is taken.".to_owned()],
        }
        .to_response()),
        Err(e) => Err(error::ErrorInternalServerError(e)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn values(username: &str) -> ProfileFormValues {
        ProfileFormValues {
            username: username.to_owned(),
            email: String::new(),
            first_name: String::new(),
            last_name: String::new(),
        }
    }

    #[test]
    fn username_is_required_and_bounded() {
        assert!(validate_profile_form(&values("alice")).is_empty());
        assert!(!validate_profile_form(&values("")).is_empty());
        assert!(!validate_profile_form(&values(&"x".repeat(151))).is_empty());
        assert!(validate_profile_form(&values(&"x".repeat(150))).is_empty());
    }

    #[test]
    fn username_limit_counts_characters_not_bytes() {
        assert!(validate_profile_form(&values(&"é".repeat(150))).is_empty());
        assert!(!validate_profile_form(&values(&"é".repeat(151))).is_empty());
    }
}
