use crate::middleware::ClientCtx;
use actix_web::body::{BoxBody, EitherBody};
use actix_web::dev::ServiceResponse;
use actix_web::http::{header, header::HeaderValue, StatusCode};
use actix_web::middleware::ErrorHandlerResponse;
use actix_web::{Error, Result};
use askama_actix::Template;

#[derive(Template)]
#[template(path = "error.html")]
struct ErrorTemplate<'a> {
    client: ClientCtx,
    status: StatusCode,
    error: Option<&'a Error>,
}

/// Replaces whatever body the failed response carried with the rendered
/// error page. The handler's message, when there is one, rides along so
/// "Post not found." and friends reach the reader.
fn error_page<B>(res: ServiceResponse<B>) -> Result<ErrorHandlerResponse<B>> {
    let page = ErrorTemplate {
        client: ClientCtx::default(),
        status: res.status(),
        error: res.response().error(),
    }
    .to_string();

    let mut res: ServiceResponse<EitherBody<B>> =
        res.map_body(|_, _| EitherBody::right(BoxBody::new(page)));

    let headers = res.response_mut().headers_mut();
    headers.insert(header::CONTENT_TYPE, HeaderValue::from_static("text/html"));
    // Error pages are the last thing a cache should hold on to.
    headers.insert(header::PRAGMA, HeaderValue::from_static("no-cache"));
    headers.insert(header::CACHE_CONTROL, HeaderValue::from_static("no-store"));

    Ok(ErrorHandlerResponse::Response(res))
}

pub fn render_404<B>(res: ServiceResponse<B>) -> Result<ErrorHandlerResponse<B>> {
    error_page::<B>(res)
}

pub fn render_500<B>(res: ServiceResponse<B>) -> Result<ErrorHandlerResponse<B>> {
    error_page::<B>(res)
}
