use super::found;
use crate::db::get_db_pool;
use crate::feed::{find_comments_for_post, find_post_for_template, CommentForTemplate, PostForTemplate};
use crate::filesystem::{image_extension, save_image};
use crate::middleware::ClientCtx;
use crate::orm::{categories, locations, posts};
use crate::url::{post_url, profile_url};
use actix_multipart::form::{tempfile::TempFile, text::Text, MultipartForm};
use actix_web::{error, get, post, web, Error, HttpResponse};
use askama_actix::{Template, TemplateToResponse};
use chrono::{NaiveDateTime, Utc};
use sea_orm::{entity::*, query::*, DatabaseConnection, DbErr};

pub(super) fn configure(conf: &mut actix_web::web::ServiceConfig) {
    // create_* carries a fixed segment that must win over `{post_id}`.
    conf.service(create_post_get)
        .service(create_post_post)
        .service(view_post)
        .service(edit_post)
        .service(update_post)
        .service(delete_post)
        .service(destroy_post);
}

#[derive(MultipartForm)]
pub struct PostFormData {
    pub title: Option<Text<String>>,
    pub text: Option<Text<String>>,
    pub pub_date: Option<Text<String>>,
    pub category: Option<Text<String>>,
    pub location: Option<Text<String>>,
    pub is_published: Option<Text<String>>,
    pub image: Option<TempFile>,
}

/// Submitted field values, kept as strings so a failed submit re-renders
/// with everything the author typed.
pub struct PostFormValues {
    pub title: String,
    pub text: String,
    pub pub_date: String,
    pub category: String,
    pub location: String,
    pub is_published: bool,
}

impl Default for PostFormValues {
    fn default() -> Self {
        Self {
            title: String::new(),
            text: String::new(),
            pub_date: String::new(),
            category: String::new(),
            location: String::new(),
            is_published: true,
        }
    }
}

impl PostFormValues {
    fn from_form(form: &PostFormData) -> Self {
        Self {
            title: text_or_blank(&form.title),
            text: text_or_blank(&form.text),
            pub_date: text_or_blank(&form.pub_date),
            category: text_or_blank(&form.category),
            location: text_or_blank(&form.location),
            // An unchecked checkbox is simply absent from the submission.
            is_published: form.is_published.is_some(),
        }
    }

    fn from_post(post: &PostForTemplate) -> Self {
        Self {
            title: post.title.clone(),
            text: post.text.clone(),
            pub_date: post.pub_date.format("%Y-%m-%dT%H:%M").to_string(),
            category: post.category_id.map(|id| id.to_string()).unwrap_or_default(),
            location: post.location_id.map(|id| id.to_string()).unwrap_or_default(),
            is_published: post.is_published,
        }
    }

    pub fn category_selected(&self, id: i32) -> bool {
        self.category == id.to_string()
    }

    pub fn location_selected(&self, id: i32) -> bool {
        self.location == id.to_string()
    }
}

/// Fields ready to write, produced only by a passing validation.
#[derive(Debug)]
pub struct NewPost {
    pub title: String,
    pub text: String,
    pub pub_date: NaiveDateTime,
    pub category_id: Option<i32>,
    pub location_id: Option<i32>,
    pub is_published: bool,
}

#[derive(Template)]
#[template(path = "post_form.html")]
pub struct PostFormTemplate {
    pub client: ClientCtx,
    pub heading: &'static str,
    pub action: String,
    pub values: PostFormValues,
    pub categories: Vec<categories::Model>,
    pub locations: Vec<locations::Model>,
    pub errors: Vec<String>,
}

#[derive(Template)]
#[template(path = "post.html")]
pub struct PostTemplate {
    pub client: ClientCtx,
    pub post: PostForTemplate,
    pub comments: Vec<CommentForTemplate>,
}

#[derive(Template)]
#[template(path = "post_delete.html")]
pub struct PostDeleteTemplate {
    pub client: ClientCtx,
    pub post: PostForTemplate,
}

fn text_or_blank(field: &Option<Text<String>>) -> String {
    field
        .as_deref()
        .map(|s| s.trim().to_owned())
        .unwrap_or_default()
}

/// Accepts the HTML datetime-local formats, with and without seconds.
pub fn parse_pub_date(value: &str) -> Option<NaiveDateTime> {
    NaiveDateTime::parse_from_str(value, "%Y-%m-%dT%H:%M")
        .or_else(|_| NaiveDateTime::parse_from_str(value, "%Y-%m-%dT%H:%M:%S"))
        .ok()
}

/// A select submits its value as a string; the empty value means "none".
pub fn parse_select_value(value: &str) -> Result<Option<i32>, ()> {
    let value = value.trim();
    if value.is_empty() {
        return Ok(None);
    }
    value.parse::<i32>().map(Some).map_err(|_| ())
}

/// The form's select choices, which double as the set of valid ids.
pub async fn load_post_form_choices(
    db: &DatabaseConnection,
) -> Result<(Vec<categories::Model>, Vec<locations::Model>), DbErr> {
    let categories = categories::Entity::find()
        .order_by_asc(categories::Column::Title)
        .all(db)
        .await?;
    let locations = locations::Entity::find()
        .order_by_asc(locations::Column::Name)
        .all(db)
        .await?;
    Ok((categories, locations))
}

pub fn validate_post_form(
    values: &PostFormValues,
    categories: &[categories::Model],
    locations: &[locations::Model],
) -> Result<NewPost, Vec<String>> {
    let mut errors = Vec::new();

    if values.title.is_empty() {
        errors.push("Title is required.".to_owned());
    // Characters, not bytes; multibyte titles get the full limit.
    } else if values.title.chars().count() > 256 {
        errors.push("Title is limited to 256 characters.".to_owned());
    }
    if values.text.is_empty() {
        errors.push("Text is required.".to_owned());
    }

    let pub_date = parse_pub_date(&values.pub_date);
    if pub_date.is_none() {
        errors.push("Publication date must be a valid date and time.".to_owned());
    }

    let category_id = match parse_select_value(&values.category) {
        Ok(Some(id)) if categories.iter().any(|c| c.id == id) => Some(id),
        Ok(None) => None,
        _ => {
            errors.push("Select a valid category.".to_owned());
            None
        }
    };
    let location_id = match parse_select_value(&values.location) {
        Ok(Some(id)) if locations.iter().any(|l| l.id == id) => Some(id),
        Ok(None) => None,
        _ => {
            errors.push("Select a valid location.".to_owned());
            None
        }
    };

    match (pub_date, errors.is_empty()) {
        (Some(pub_date), true) => Ok(NewPost {
            title: values.title.clone(),
            text: values.text.clone(),
            pub_date,
            category_id,
            location_id,
            is_published: values.is_published,
        }),
        _ => Err(errors),
    }
}

/// Checks an optional upload and copies it under the media root.
/// A bare file input arrives as a zero-byte part and means "no image".
fn store_image(image: &Option<TempFile>) -> Result<Option<String>, String> {
    let file = match image {
        Some(file) if file.size > 0 => file,
        _ => return Ok(None),
    };

    let extension = file.content_type.as_ref().and_then(image_extension);
    match extension {
        Some(extension) => match save_image(file, extension) {
            Ok(filename) => Ok(Some(filename)),
            Err(e) => {
                log::error!("store_image: {}", e);
                Err("The image could not be stored.".to_owned())
            }
        },
        None => Err("Upload a PNG, JPEG, GIF, or WebP image.".to_owned()),
    }
}

#[get("/posts/create/")]
async fn create_post_get(client: ClientCtx) -> Result<HttpResponse, Error> {
    if !client.is_user() {
        return Ok(found("/login".to_owned()));
    }

    let (categories, locations) = load_post_form_choices(get_db_pool())
        .await
        .map_err(error::ErrorInternalServerError)?;

    Ok(PostFormTemplate {
        client,
        heading: "New post",
        action: "/posts/create/".to_owned(),
        values: PostFormValues::default(),
        categories,
        locations,
        errors: Vec::new(),
    }
    .to_response())
}

#[post("/posts/create/")]
async fn create_post_post(
    client: ClientCtx,
    form: MultipartForm<PostFormData>,
) -> Result<HttpResponse, Error> {
    let author_id = match client.get_id() {
        Some(id) => id,
        None => return Ok(found("/login".to_owned())),
    };

    let db = get_db_pool();
    let (categories, locations) = load_post_form_choices(db)
        .await
        .map_err(error::ErrorInternalServerError)?;
    let values = PostFormValues::from_form(&form);

    let (new_post, image) = match validate_post_form(&values, &categories, &locations)
        .and_then(|new_post| match store_image(&form.image) {
            Ok(image) => Ok((new_post, image)),
            Err(msg) => Err(vec![msg]),
        }) {
        Ok(ok) => ok,
        Err(errors) => {
            return Ok(PostFormTemplate {
                client,
                heading: "New post",
                action: "/posts/create/".to_owned(),
                values,
                categories,
                locations,
                errors,
            }
            .to_response())
        }
    };

    posts::Entity::insert(posts::ActiveModel {
        created_at: Set(Utc::now().naive_utc()),
        title: Set(new_post.title),
        text: Set(new_post.text),
        pub_date: Set(new_post.pub_date),
        author_id: Set(author_id),
        category_id: Set(new_post.category_id),
        location_id: Set(new_post.location_id),
        image: Set(image),
        is_published: Set(new_post.is_published),
        ..Default::default()
    })
    .exec(db)
    .await
    .map_err(error::ErrorInternalServerError)?;

    Ok(found(profile_url(&client.get_name())))
}

#[get("/posts/{post_id}/")]
async fn view_post(client: ClientCtx, path: web::Path<i32>) -> Result<HttpResponse, Error> {
    let db = get_db_pool();
    let post = find_post_for_template(db, path.into_inner())
        .await
        .map_err(error::ErrorInternalServerError)?
        .ok_or_else(|| error::ErrorNotFound("Post not found."))?;

    // Drafts and future posts exist only for their author.
    if !client.can_view_post(&post) {
        return Err(error::ErrorNotFound("Post not found."));
    }

    let comments = find_comments_for_post(db, post.id)
        .await
        .map_err(error::ErrorInternalServerError)?;

    Ok(PostTemplate {
        client,
        post,
        comments,
    }
    .to_response())
}

#[get("/posts/{post_id}/edit/")]
async fn edit_post(client: ClientCtx, path: web::Path<i32>) -> Result<HttpResponse, Error> {
    if !client.is_user() {
        return Ok(found("/login".to_owned()));
    }

    let db = get_db_pool();
    let post = find_post_for_template(db, path.into_inner())
        .await
        .map_err(error::ErrorInternalServerError)?
        .ok_or_else(|| error::ErrorNotFound("Post not found."))?;

    if !client.can_edit_post(&post) {
        return Ok(found(post_url(post.id)));
    }

    let (categories, locations) = load_post_form_choices(db)
        .await
        .map_err(error::ErrorInternalServerError)?;

    Ok(PostFormTemplate {
        client,
        heading: "Edit post",
        action: format!("/posts/{}/edit/", post.id),
        values: PostFormValues::from_post(&post),
        categories,
        locations,
        errors: Vec::new(),
    }
    .to_response())
}

#[post("/posts/{post_id}/edit/")]
async fn update_post(
    client: ClientCtx,
    path: web::Path<i32>,
    form: MultipartForm<PostFormData>,
) -> Result<HttpResponse, Error> {
    if !client.is_user() {
        return Ok(found("/login".to_owned()));
    }

    let db = get_db_pool();
    let post = find_post_for_template(db, path.into_inner())
        .await
        .map_err(error::ErrorInternalServerError)?
        .ok_or_else(|| error::ErrorNotFound("Post not found."))?;

    if !client.can_edit_post(&post) {
        return Ok(found(post_url(post.id)));
    }

    let (categories, locations) = load_post_form_choices(db)
        .await
        .map_err(error::ErrorInternalServerError)?;
    let values = PostFormValues::from_form(&form);

    let (new_post, image) = match validate_post_form(&values, &categories, &locations)
        .and_then(|new_post| match store_image(&form.image) {
            Ok(image) => Ok((new_post, image)),
            Err(msg) => Err(vec![msg]),
        }) {
        Ok(ok) => ok,
        Err(errors) => {
            return Ok(PostFormTemplate {
                client,
                heading: "Edit post",
                action: format!("/posts/{}/edit/", post.id),
                values,
                categories,
                locations,
                errors,
            }
            .to_response())
        }
    };

    let mut active = posts::ActiveModel {
        id: Set(post.id),
        title: Set(new_post.title),
        text: Set(new_post.text),
        pub_date: Set(new_post.pub_date),
        category_id: Set(new_post.category_id),
        location_id: Set(new_post.location_id),
        is_published: Set(new_post.is_published),
        ..Default::default()
    };
    // Keep the old image unless a replacement was uploaded.
    if let Some(filename) = image {
        active.image = Set(Some(filename));
    }
    active
        .update(db)
        .await
        .map_err(error::ErrorInternalServerError)?;

    Ok(found(post_url(post.id)))
}

#[get("/posts/{post_id}/delete/")]
async fn delete_post(client: ClientCtx, path: web::Path<i32>) -> Result<HttpResponse, Error> {
    if !client.is_user() {
        return Ok(found("/login".to_owned()));
    }

    let db = get_db_pool();
    let post = find_post_for_template(db, path.into_inner())
        .await
        .map_err(error::ErrorInternalServerError)?
        .ok_or_else(|| error::ErrorNotFound("Post not found."))?;

    if !client.can_delete_post(&post) {
        return Ok(found(post_url(post.id)));
    }

    Ok(PostDeleteTemplate { client, post }.to_response())
}

#[post("/posts/{post_id}/delete/")]
async fn destroy_post(client: ClientCtx, path: web::Path<i32>) -> Result<HttpResponse, Error> {
    if !client.is_user() {
        return Ok(found("/login".to_owned()));
    }

    let db = get_db_pool();
    let post = find_post_for_template(db, path.into_inner())
        .await
        .map_err(error::ErrorInternalServerError)?
        .ok_or_else(|| error::ErrorNotFound("Post not found."))?;

    if !client.can_delete_post(&post) {
        return Ok(found(post_url(post.id)));
    }

    posts::Entity::delete_by_id(post.id)
        .exec(db)
        .await
        .map_err(error::ErrorInternalServerError)?;

    Ok(found(profile_url(&client.get_name())))
}
