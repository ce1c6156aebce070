//! Post feed queries: joined listing rows, the public visibility filter,
//! and page fetching shared by the home, category, and profile views.

use crate::orm::{categories, comments, locations, posts, users};
use chrono::NaiveDateTime;
use sea_orm::{
    entity::*, query::*, DatabaseConnection, DbErr, FromQueryResult, PaginatorTrait, Select,
};

pub const POSTS_PER_PAGE: u64 = 10;

/// A fully joined struct representing the post model and its relational data.
#[derive(Clone, Debug, FromQueryResult)]
pub struct PostForTemplate {
    pub id: i32,
    pub title: String,
    pub text: String,
    pub pub_date: NaiveDateTime,
    pub author_id: i32,
    pub category_id: Option<i32>,
    pub location_id: Option<i32>,
    pub image: Option<String>,
    pub is_published: bool,
    pub created_at: NaiveDateTime,
    // join users
    pub author: String,
    // join categories
    pub category_title: Option<String>,
    pub category_slug: Option<String>,
    pub category_is_published: Option<bool>,
    // join locations
    pub location_name: Option<String>,
    // aggregate
    pub comment_count: i64,
}

impl PostForTemplate {
    /// Mirrors the public feed filter for a row already in hand: published,
    /// not future-dated, and not tucked under an unpublished category.
    pub fn is_public_at(&self, now: NaiveDateTime) -> bool {
        self.is_published && self.pub_date <= now && self.category_is_published.unwrap_or(true)
    }

    /// Category slug and title as one option, for the template link.
    pub fn category_pair(&self) -> Option<(&String, &String)> {
        match (&self.category_slug, &self.category_title) {
            (Some(slug), Some(title)) => Some((slug, title)),
            _ => None,
        }
    }
}

/// A comment row with its author's name adjoined.
#[derive(Clone, Debug, FromQueryResult)]
pub struct CommentForTemplate {
    pub id: i32,
    pub text: String,
    pub author_id: i32,
    pub post_id: i32,
    pub created_at: NaiveDateTime,
    // join users
    pub author: String,
}

/// One page of feed results plus the numbers the pagination strip needs.
pub struct Paginated<T> {
    pub items: Vec<T>,
    pub page: u64,
    pub pages: u64,
}

impl<T> Paginated<T> {
    pub fn has_prev(&self) -> bool {
        self.page > 1
    }

    pub fn has_next(&self) -> bool {
        self.page < self.pages
    }

    pub fn prev_page(&self) -> u64 {
        self.page - 1
    }

    pub fn next_page(&self) -> u64 {
        self.page + 1
    }
}

/// Base select for post listings and detail pages: every post column plus
/// author name, category title/slug/visibility, location name, and the
/// comment count, newest pub_date first.
///
/// Grouping is by each joined table's primary key so the comment join can
/// aggregate without collapsing the other columns.
pub fn select_posts_for_template() -> Select<posts::Entity> {
    posts::Entity::find()
        .left_join(users::Entity)
        .column_as(users::Column::Name, "author")
        .left_join(categories::Entity)
        .column_as(categories::Column::Title, "category_title")
        .column_as(categories::Column::Slug, "category_slug")
        .column_as(categories::Column::IsPublished, "category_is_published")
        .left_join(locations::Entity)
        .column_as(locations::Column::Name, "location_name")
        .left_join(comments::Entity)
        .column_as(comments::Column::Id.count(), "comment_count")
        .group_by(posts::Column::Id)
        .group_by(users::Column::Id)
        .group_by(categories::Column::Id)
        .group_by(locations::Column::Id)
        .order_by_desc(posts::Column::PubDate)
}

/// Filter matching what anonymous visitors may see: published, pub_date in
/// the past, and either uncategorized or under a published category.
pub fn public_filter(now: NaiveDateTime) -> Condition {
    Condition::all()
        .add(posts::Column::IsPublished.eq(true))
        .add(posts::Column::PubDate.lte(now))
        .add(
            Condition::any()
                .add(posts::Column::CategoryId.is_null())
                .add(categories::Column::IsPublished.eq(true)),
        )
}

pub fn home_posts(now: NaiveDateTime) -> Select<posts::Entity> {
    select_posts_for_template().filter(public_filter(now))
}

pub fn category_posts(category_id: i32, now: NaiveDateTime) -> Select<posts::Entity> {
    select_posts_for_template()
        .filter(public_filter(now))
        .filter(posts::Column::CategoryId.eq(category_id))
}

/// Everything a member has written, drafts and future posts included.
/// TODO: product call pending on whether visitors should see drafts here
/// or only the profile's owner.
pub fn profile_posts(author_id: i32) -> Select<posts::Entity> {
    select_posts_for_template().filter(posts::Column::AuthorId.eq(author_id))
}

/// Runs a feed select for the given 1-based page.
/// Returns None for page 0 or a page past the end; page 1 of an empty feed
/// is an empty page rather than a miss.
pub async fn fetch_posts_page(
    db: &DatabaseConnection,
    select: Select<posts::Entity>,
    page: u64,
) -> Result<Option<Paginated<PostForTemplate>>, DbErr> {
    if page == 0 {
        return Ok(None);
    }

    let paginator = select
        .into_model::<PostForTemplate>()
        .paginate(db, POSTS_PER_PAGE);
    let pages = paginator.num_pages().await?.max(1);
    if page > pages {
        return Ok(None);
    }

    let items = paginator.fetch_page(page - 1).await?;
    Ok(Some(Paginated { items, page, pages }))
}

pub async fn find_post_for_template(
    db: &DatabaseConnection,
    id: i32,
) -> Result<Option<PostForTemplate>, DbErr> {
    select_posts_for_template()
        .filter(posts::Column::Id.eq(id))
        .into_model::<PostForTemplate>()
        .one(db)
        .await
}

pub async fn find_comment_for_template(
    db: &DatabaseConnection,
    id: i32,
) -> Result<Option<CommentForTemplate>, DbErr> {
    comments::Entity::find_by_id(id)
        .left_join(users::Entity)
        .column_as(users::Column::Name, "author")
        .into_model::<CommentForTemplate>()
        .one(db)
        .await
}

pub async fn find_comments_for_post(
    db: &DatabaseConnection,
    post_id: i32,
) -> Result<Vec<CommentForTemplate>, DbErr> {
    comments::Entity::find()
        .left_join(users::Entity)
        .column_as(users::Column::Name, "author")
        .filter(comments::Column::PostId.eq(post_id))
        .order_by_asc(comments::Column::CreatedAt)
        .into_model::<CommentForTemplate>()
        .all(db)
        .await
}

#[cfg(test)]
mod tests {
    use super::*;
    use sea_orm::{DbBackend, MockDatabase, QueryTrait, Value};
    use std::collections::BTreeMap;

    fn date(y: i32, m: u32, d: u32) -> NaiveDateTime {
        chrono::NaiveDate::from_ymd_opt(y, m, d)
            .unwrap()
            .and_hms_opt(0, 0, 0)
            .unwrap()
    }

    fn template_post(
        is_published: bool,
        pub_date: NaiveDateTime,
        category_is_published: Option<bool>,
    ) -> PostForTemplate {
        PostForTemplate {
            id: 1,
            title: "Title".to_owned(),
            text: "Body".to_owned(),
            pub_date,
            author_id: 1,
            category_id: category_is_published.map(|_| 1),
            location_id: None,
            image: None,
            is_published,
            created_at: date(2024, 1, 1),
            author: "alice".to_owned(),
            category_title: category_is_published.map(|_| "Cooking".to_owned()),
            category_slug: category_is_published.map(|_| "cooking".to_owned()),
            category_is_published,
            location_name: None,
            comment_count: 0,
        }
    }

    fn count_row(n: i64) -> BTreeMap<&'static str, Value> {
        BTreeMap::from([("num_items", n.into())])
    }

    fn post_row(id: i32) -> BTreeMap<&'static str, Value> {
        BTreeMap::from([
            ("id", id.into()),
            ("title", format!("Post {}", id).into()),
            ("text", "Body".to_owned().into()),
            ("pub_date", date(2024, 1, 1).into()),
            ("author_id", 1i32.into()),
            ("category_id", Value::Int(None)),
            ("location_id", Value::Int(None)),
            ("image", Value::String(None)),
            ("is_published", true.into()),
            ("created_at", date(2024, 1, 1).into()),
            ("author", "alice".to_owned().into()),
            ("category_title", Value::String(None)),
            ("category_slug", Value::String(None)),
            ("category_is_published", Value::Bool(None)),
            ("location_name", Value::String(None)),
            ("comment_count", 0i64.into()),
        ])
    }

    fn comment_row(id: i32, author: &str) -> BTreeMap<&'static str, Value> {
        BTreeMap::from([
            ("id", id.into()),
            ("text", format!("Comment {}", id).into()),
            ("author_id", 2i32.into()),
            ("post_id", 9i32.into()),
            ("created_at", date(2024, 1, id as u32).into()),
            ("author", author.to_owned().into()),
        ])
    }

    #[test]
    fn public_visibility_needs_flag_date_and_category_together() {
        let now = date(2024, 6, 1);
        assert!(template_post(true, date(2024, 5, 1), None).is_public_at(now));
        assert!(template_post(true, date(2024, 5, 1), Some(true)).is_public_at(now));
        assert!(!template_post(false, date(2024, 5, 1), None).is_public_at(now));
        assert!(!template_post(true, date(2024, 7, 1), None).is_public_at(now));
        assert!(!template_post(true, date(2024, 5, 1), Some(false)).is_public_at(now));
    }

    #[test]
    fn a_post_dated_exactly_now_is_public() {
        let now = date(2024, 6, 1);
        assert!(template_post(true, now, None).is_public_at(now));
    }

    #[test]
    fn home_feed_sql_joins_annotates_and_filters() {
        let sql = home_posts(date(2024, 6, 1))
            .build(DbBackend::Postgres)
            .to_string();
        assert!(sql.contains(r#"LEFT JOIN "users""#), "{}", sql);
        assert!(sql.contains(r#"LEFT JOIN "categories""#), "{}", sql);
        assert!(sql.contains(r#"LEFT JOIN "locations""#), "{}", sql);
        assert!(sql.contains(r#"LEFT JOIN "comments""#), "{}", sql);
        assert!(
            sql.contains(r#"COUNT("comments"."id") AS "comment_count""#),
            "{}",
            sql
        );
        assert!(sql.contains(r#"GROUP BY "posts"."id""#), "{}", sql);
        assert!(sql.contains(r#"ORDER BY "posts"."pub_date" DESC"#), "{}", sql);
        assert!(sql.contains(r#""posts"."is_published" = TRUE"#), "{}", sql);
        assert!(sql.contains(r#""posts"."pub_date" <="#), "{}", sql);
        assert!(
            sql.contains(r#""posts"."category_id" IS NULL OR "categories"."is_published" = TRUE"#),
            "{}",
            sql
        );
    }

    #[test]
    fn category_feed_sql_restricts_to_the_category() {
        let sql = category_posts(3, date(2024, 6, 1))
            .build(DbBackend::Postgres)
            .to_string();
        assert!(sql.contains(r#""posts"."category_id" = 3"#), "{}", sql);
        assert!(sql.contains(r#""posts"."is_published" = TRUE"#), "{}", sql);
    }

    #[test]
    fn profile_feed_sql_skips_the_public_filter() {
        let sql = profile_posts(7).build(DbBackend::Postgres).to_string();
        assert!(sql.contains(r#""posts"."author_id" = 7"#), "{}", sql);
        assert!(!sql.contains(r#""posts"."is_published" = TRUE"#), "{}", sql);
        assert!(!sql.contains(r#""posts"."pub_date" <="#), "{}", sql);
    }

    #[test]
    fn comment_listing_sql_orders_oldest_first() {
        let sql = comments::Entity::find()
            .left_join(users::Entity)
            .column_as(users::Column::Name, "author")
            .filter(comments::Column::PostId.eq(9))
            .order_by_asc(comments::Column::CreatedAt)
            .build(DbBackend::Postgres)
            .to_string();
        assert!(
            sql.contains(r#"ORDER BY "comments"."created_at" ASC"#),
            "{}",
            sql
        );
        assert!(sql.contains(r#""comments"."post_id" = 9"#), "{}", sql);
    }

    #[actix_rt::test]
    async fn twelve_posts_make_two_pages() {
        let db = MockDatabase::new(DbBackend::Postgres)
            .append_query_results([vec![count_row(12)], vec![post_row(11), post_row(12)]])
            .into_connection();

        let page = fetch_posts_page(&db, profile_posts(1), 2)
            .await
            .expect("query failed")
            .expect("page 2 of 2 should exist");
        assert_eq!(page.pages, 2);
        assert_eq!(page.page, 2);
        assert_eq!(page.items.len(), 2);
        assert!(page.has_prev());
        assert!(!page.has_next());
        assert_eq!(page.prev_page(), 1);
    }

    #[actix_rt::test]
    async fn a_page_past_the_end_is_a_miss() {
        let db = MockDatabase::new(DbBackend::Postgres)
            .append_query_results([vec![count_row(12)]])
            .into_connection();

        let page = fetch_posts_page(&db, profile_posts(1), 3)
            .await
            .expect("query failed");
        assert!(page.is_none());
    }

    #[actix_rt::test]
    async fn page_zero_is_a_miss_without_touching_the_database() {
        let db = MockDatabase::new(DbBackend::Postgres).into_connection();

        let page = fetch_posts_page(&db, profile_posts(1), 0)
            .await
            .expect("query failed");
        assert!(page.is_none());
    }

    #[actix_rt::test]
    async fn page_one_of_an_empty_feed_is_an_empty_page() {
        let db = MockDatabase::new(DbBackend::Postgres)
            .append_query_results([vec![count_row(0)], vec![]])
            .into_connection();

        let page = fetch_posts_page(&db, profile_posts(1), 1)
            .await
            .expect("query failed")
            .expect("page 1 always resolves");
        assert_eq!(page.pages, 1);
        assert!(page.items.is_empty());
        assert!(!page.has_prev());
        assert!(!page.has_next());
    }

    #[actix_rt::test]
    async fn comment_rows_map_with_their_author_names() {
        let db = MockDatabase::new(DbBackend::Postgres)
            .append_query_results([vec![comment_row(1, "bob"), comment_row(2, "carol")]])
            .into_connection();

        let comments = find_comments_for_post(&db, 9).await.expect("query failed");
        assert_eq!(comments.len(), 2);
        assert_eq!(comments[0].author, "bob");
        assert_eq!(comments[1].author, "carol");
        assert_eq!(comments[1].post_id, 9);
    }
}
