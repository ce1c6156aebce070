use crate::db::get_db_pool;
use crate::feed::{category_posts, fetch_posts_page, Paginated, PostForTemplate};
use crate::middleware::ClientCtx;
use crate::orm::categories;
use actix_web::{error, get, web, Error, Responder};
use askama_actix::{Template, TemplateToResponse};
use chrono::Utc;
use sea_orm::{entity::*, query::*, DatabaseConnection, DbErr};

pub(super) fn configure(conf: &mut actix_web::web::ServiceConfig) {
    conf.service(view_category);
}

#[derive(Template)]
#[template(path = "category.html")]
pub struct CategoryTemplate {
    pub client: ClientCtx,
    pub category: categories::Model,
    pub posts: Paginated<PostForTemplate>,
    pub page_base: String,
}

/// Unpublished categories are hidden entirely, so a miss and a hidden
/// category look the same to the client.
pub async fn find_published_category_by_slug(
    db: &DatabaseConnection,
    slug: &str,
) -> Result<Option<categories::Model>, DbErr> {
    categories::Entity::find()
        .filter(categories::Column::Slug.eq(slug))
        .filter(categories::Column::IsPublished.eq(true))
        .one(db)
        .await
}

#[get("/{slug}/")]
async fn view_category(
    client: ClientCtx,
    path: web::Path<String>,
    query: web::Query<super::PageQuery>,
) -> Result<impl Responder, Error> {
    let db = get_db_pool();
    let slug = path.into_inner();

    let category = find_published_category_by_slug(db, &slug)
        .await
        .map_err(error::ErrorInternalServerError)?
        .ok_or_else(|| error::ErrorNotFound("Category not found."))?;

    let posts = fetch_posts_page(
        db,
        category_posts(category.id, Utc::now().naive_utc()),
        query.page(),
    )
    .await
    .map_err(error::ErrorInternalServerError)?
    .ok_or_else(|| error::ErrorNotFound("That page of posts does not exist."))?;

    Ok(CategoryTemplate {
        client,
        page_base: crate::url::category_url(&category.slug),
        category,
        posts,
    }
    .to_response())
}
