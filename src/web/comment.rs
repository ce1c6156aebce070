use super::found;
use crate::db::get_db_pool;
use crate::feed::{find_comment_for_template, CommentForTemplate};
use crate::middleware::ClientCtx;
use crate::orm::{comments, posts};
use crate::url::post_url;
use actix_web::{error, get, post, web, Error, HttpResponse};
use askama_actix::{Template, TemplateToResponse};
use chrono::Utc;
use sea_orm::{entity::*, query::*};
use serde::Deserialize;

pub(super) fn configure(conf: &mut actix_web::web::ServiceConfig) {
    conf.service(create_comment_get)
        .service(create_comment_post)
        .service(edit_comment)
        .service(update_comment)
        .service(delete_comment)
        .service(destroy_comment);
}

#[derive(Deserialize)]
pub struct CommentFormData {
    pub text: String,
}

#[derive(Template)]
#[template(path = "comment_form.html")]
pub struct CommentFormTemplate {
    pub client: ClientCtx,
    pub heading: &'static str,
    pub action: String,
    pub text: String,
    pub errors: Vec<String>,
}

#[derive(Template)]
#[template(path = "comment_delete.html")]
pub struct CommentDeleteTemplate {
    pub client: ClientCtx,
    pub comment: CommentForTemplate,
}

async fn find_post_id(post_id: i32) -> Result<i32, Error> {
    posts::Entity::find_by_id(post_id)
        .select_only()
        .column(posts::Column::Id)
        .into_tuple::<i32>()
        .one(get_db_pool())
        .await
        .map_err(error::ErrorInternalServerError)?
        .ok_or_else(|| error::ErrorNotFound("Post not found."))
}

#[get("/posts/{post_id}/comment/")]
async fn create_comment_get(client: ClientCtx, path: web::Path<i32>) -> Result<HttpResponse, Error> {
    if !client.is_user() {
        return Ok(found("/login".to_owned()));
    }

    let post_id = find_post_id(path.into_inner()).await?;

    Ok(CommentFormTemplate {
        client,
        heading: "Add comment",
        action: format!("/posts/{}/comment/", post_id),
        text: String::new(),
        errors: Vec::new(),
    }
    .to_response())
}

#[post("/posts/{post_id}/comment/")]
async fn create_comment_post(
    client: ClientCtx,
    path: web::Path<i32>,
    form: web::Form<CommentFormData>,
) -> Result<HttpResponse, Error> {
    let author_id = match client.get_id() {
        Some(id) => id,
        None => return Ok(found("/login".to_owned())),
    };

    let post_id = find_post_id(path.into_inner()).await?;

    let text = form.text.trim().to_owned();
    if text.is_empty() {
        return Ok(CommentFormTemplate {
            client,
            heading: "Add comment",
            action: format!("/posts/{}/comment/", post_id),
            text,
            errors: vec!["Comment text is required.".to_owned()],
        }
        .to_response());
    }

    comments::Entity::insert(comments::ActiveModel {
        created_at: Set(Utc::now().naive_utc()),
        text: Set(text),
        author_id: Set(author_id),
        post_id: Set(post_id),
        ..Default::default()
    })
    .exec(get_db_pool())
    .await
    .map_err(error::ErrorInternalServerError)?;

    Ok(found(post_url(post_id)))
}

/// Comments resolve by their own id; the post segment of the path is
/// only there to keep the URLs uniform.
#[get("/posts/{post_id}/comment/{comment_id}/edit_comment/")]
async fn edit_comment(
    client: ClientCtx,
    path: web::Path<(i32, i32)>,
) -> Result<HttpResponse, Error> {
    if !client.is_user() {
        return Ok(found("/login".to_owned()));
    }

    let (_, comment_id) = path.into_inner();
    let comment = find_comment_for_template(get_db_pool(), comment_id)
        .await
        .map_err(error::ErrorInternalServerError)?
        .ok_or_else(|| error::ErrorNotFound("Comment not found."))?;

    if !client.can_edit_comment(&comment) {
        return Ok(found(post_url(comment.post_id)));
    }

    Ok(CommentFormTemplate {
        client,
        heading: "Edit comment",
        action: format!(
            "/posts/{}/comment/{}/edit_comment/",
            comment.post_id, comment.id
        ),
        text: comment.text,
        errors: Vec::new(),
    }
    .to_response())
}

#[post("/posts/{post_id}/comment/{comment_id}/edit_comment/")]
async fn update_comment(
    client: ClientCtx,
    path: web::Path<(i32, i32)>,
    form: web::Form<CommentFormData>,
) -> Result<HttpResponse, Error> {
    if !client.is_user() {
        return Ok(found("/login".to_owned()));
    }

    let (_, comment_id) = path.into_inner();
    let comment = find_comment_for_template(get_db_pool(), comment_id)
        .await
        .map_err(error::ErrorInternalServerError)?
        .ok_or_else(|| error::ErrorNotFound("Comment not found."))?;

    if !client.can_edit_comment(&comment) {
        return Ok(found(post_url(comment.post_id)));
    }

    let text = form.text.trim().to_owned();
    if text.is_empty() {
        return Ok(CommentFormTemplate {
            client,
            heading: "Edit comment",
            action: format!(
                "/posts/{}/comment/{}/edit_comment/",
                comment.post_id, comment.id
            ),
            text,
            errors: vec!["Comment text is required.".to_owned()],
        }
        .to_response());
    }

    // Only the text changes; created_at stays what it was.
    comments::ActiveModel {
        id: Set(comment.id),
        text: Set(text),
        ..Default::default()
    }
    .update(get_db_pool())
    .await
    .map_err(error::ErrorInternalServerError)?;

    Ok(found(post_url(comment.post_id)))
}

#[get("/posts/{post_id}/comment/{comment_id}/delete_comment/")]
async fn delete_comment(
    client: ClientCtx,
    path: web::Path<(i32, i32)>,
) -> Result<HttpResponse, Error> {
    if !client.is_user() {
        return Ok(found("/login".to_owned()));
    }

    let (_, comment_id) = path.into_inner();
    let comment = find_comment_for_template(get_db_pool(), comment_id)
        .await
        .map_err(error::ErrorInternalServerError)?
        .ok_or_else(|| error::ErrorNotFound("Comment not found."))?;

    if !client.can_delete_comment(&comment) {
        return Ok(found(post_url(comment.post_id)));
    }

    Ok(CommentDeleteTemplate { client, comment }.to_response())
}

#[post("/posts/{post_id}/comment/{comment_id}/delete_comment/")]
async fn destroy_comment(
    client: ClientCtx,
    path: web::Path<(i32, i32)>,
) -> Result<HttpResponse, Error> {
    if !client.is_user() {
        return Ok(found("/login".to_owned()));
    }

    let (_, comment_id) = path.into_inner();
    let comment = find_comment_for_template(get_db_pool(), comment_id)
        .await
        .map_err(error::ErrorInternalServerError)?
        .ok_or_else(|| error::ErrorNotFound("Comment not found."))?;

    if !client.can_delete_comment(&comment) {
        return Ok(found(post_url(comment.post_id)));
    }

    comments::Entity::delete_by_id(comment.id)
        .exec(get_db_pool())
        .await
        .map_err(error::ErrorInternalServerError)?;

    Ok(found(post_url(comment.post_id)))
}
