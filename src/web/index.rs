use crate::db::get_db_pool;
use crate::feed::{fetch_posts_page, home_posts, Paginated, PostForTemplate};
use crate::middleware::ClientCtx;
use actix_web::{error, get, web, Error, Responder};
use askama_actix::{Template, TemplateToResponse};
use chrono::Utc;

pub(super) fn configure(conf: &mut actix_web::web::ServiceConfig) {
    conf.service(view_index);
}

#[derive(Template)]
#[template(path = "index.html")]
pub struct IndexTemplate {
    pub client: ClientCtx,
    pub posts: Paginated<PostForTemplate>,
    pub page_base: String,
}

#[get("/")]
async fn view_index(
    client: ClientCtx,
    query: web::Query<super::PageQuery>,
) -> Result<impl Responder, Error> {
    let posts = fetch_posts_page(
        get_db_pool(),
        home_posts(Utc::now().naive_utc()),
        query.page(),
    )
    .await
    .map_err(error::ErrorInternalServerError)?
    .ok_or_else(|| error::ErrorNotFound("That page of posts does not exist."))?;

    Ok(IndexTemplate {
        client,
        posts,
        page_base: "/".to_owned(),
    }
    .to_response())
}
