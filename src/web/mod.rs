pub mod account;
pub mod category;
pub mod comment;
pub mod error;
pub mod index;
pub mod post;
pub mod profile;

use actix_web::HttpResponse;
use serde::Deserialize;

/// Shared `?page=N` query for paginated listings. Pages are 1-based.
/// The value arrives as a raw string so garbage never fails extraction.
#[derive(Deserialize)]
pub struct PageQuery {
    pub page: Option<String>,
}

impl PageQuery {
    /// Absent means the first page; anything non-numeric resolves to
    /// page 0, which every listing answers with a 404.
    pub fn page(&self) -> u64 {
        match &self.page {
            None => 1,
            Some(raw) => raw.parse().unwrap_or(0),
        }
    }
}

/// 302 redirect, the way form handlers hand control back to a GET view.
pub fn found(location: String) -> HttpResponse {
    HttpResponse::Found()
        .append_header(("Location", location))
        .finish()
}

/// Optional text inputs submit empty strings; store those as NULL.
pub(crate) fn none_if_blank(value: &str) -> Option<String> {
    let value = value.trim();
    if value.is_empty() {
        None
    } else {
        Some(value.to_owned())
    }
}

/// Configures the web app.
///
/// Services are matched top to bottom: fixed paths before parameterized
/// ones, and the category feed dead last because its pattern swallows any
/// single trailing-slash segment.
pub fn configure(conf: &mut actix_web::web::ServiceConfig) {
    index::configure(conf);
    account::configure(conf);
    post::configure(conf);
    comment::configure(conf);
    profile::configure(conf);
    conf.service(actix_files::Files::new(
        "/media",
        crate::filesystem::get_media_root(),
    ));
    category::configure(conf);
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn absent_page_query_means_the_first_page() {
        assert_eq!(PageQuery { page: None }.page(), 1);
        assert_eq!(PageQuery { page: Some("4".to_owned()) }.page(), 4);
    }

    #[test]
    fn garbage_page_queries_resolve_to_the_missing_page_zero() {
        assert_eq!(PageQuery { page: Some("abc".to_owned()) }.page(), 0);
        assert_eq!(PageQuery { page: Some("".to_owned()) }.page(), 0);
        assert_eq!(PageQuery { page: Some("-1".to_owned()) }.page(), 0);
    }

    #[test]
    fn blank_inputs_become_null() {
        assert_eq!(none_if_blank(""), None);
        assert_eq!(none_if_blank("   "), None);
        assert_eq!(none_if_blank(" a "), Some("a".to_owned()));
    }
}
