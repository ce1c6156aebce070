use crate::feed::{CommentForTemplate, PostForTemplate};
use crate::session::authenticate_by_session;
use crate::user::ClientUser;
use actix_session::SessionExt;
use actix_utils::future::{ok, Ready};
use actix_web::dev::{
    forward_ready, Extensions, Payload, Service, ServiceRequest, ServiceResponse, Transform,
};
use actix_web::{Error, FromRequest, HttpMessage, HttpRequest};
use chrono::Utc;
use futures_util::future::{FutureExt as _, LocalBoxFuture};
use std::time::{Duration, Instant};
use std::{cell::RefCell, rc::Rc};

/// Client data stored for a single request cycle.
/// Distinct from ClientCtx because it is defined through request data.
#[derive(Clone, Debug)]
pub struct ClientCtxInner {
    pub client: Option<ClientUser>,
    pub request_start: Instant,
}

impl ClientCtxInner {
    fn new() -> Self {
        Self {
            client: None,
            request_start: Instant::now(),
        }
    }
}

/// Client context passed to routes.
/// Wraps ClientCtxInner, which is set at the beginning of the request.
#[derive(Clone, Debug)]
pub struct ClientCtx(Rc<RefCell<ClientCtxInner>>);

impl Default for ClientCtx {
    fn default() -> Self {
        Self::new()
    }
}

impl ClientCtx {
    pub fn new() -> Self {
        Self(Rc::new(RefCell::new(ClientCtxInner::new())))
    }

    /// An already-authenticated context, for code paths that sit outside
    /// the request cycle.
    pub fn with_user(user: ClientUser) -> Self {
        let ctx = Self::new();
        ctx.0.borrow_mut().client = Some(user);
        ctx
    }

    fn get_client_ctx(extensions: &mut Extensions) -> Self {
        match extensions.get::<Rc<RefCell<ClientCtxInner>>>() {
            // Existing record in extensions; pull it.
            Some(inner) => Self(Rc::clone(inner)),
            // No existing record; create and insert it.
            None => {
                let inner = Rc::new(RefCell::new(ClientCtxInner::new()));
                extensions.insert(inner.clone());
                Self(inner)
            }
        }
    }

    /// Returns either the user's id or None.
    pub fn get_id(&self) -> Option<i32> {
        self.0.borrow().client.as_ref().map(|u| u.id)
    }

    /// Returns either the user's name or the word for guest.
    /// TODO: l10n "Guest"
    pub fn get_name(&self) -> String {
        match &self.0.borrow().client {
            Some(user) => user.name.to_owned(),
            None => "Guest".to_owned(),
        }
    }

    pub fn is_user(&self) -> bool {
        self.0.borrow().client.is_some()
    }

    /// The single ownership predicate everything else leans on.
    pub fn owns(&self, author_id: i32) -> bool {
        self.get_id() == Some(author_id)
    }

    pub fn can_edit_post(&self, post: &PostForTemplate) -> bool {
        self.owns(post.author_id)
    }

    pub fn can_delete_post(&self, post: &PostForTemplate) -> bool {
        self.owns(post.author_id)
    }

    pub fn can_edit_comment(&self, comment: &CommentForTemplate) -> bool {
        self.owns(comment.author_id)
    }

    pub fn can_delete_comment(&self, comment: &CommentForTemplate) -> bool {
        self.owns(comment.author_id)
    }

    /// Authors may preview their own drafts and future-dated posts;
    /// everyone else gets the public filter.
    pub fn can_view_post(&self, post: &PostForTemplate) -> bool {
        post.is_public_at(Utc::now().naive_utc()) || self.owns(post.author_id)
    }

    /// Returns Duration representing request time.
    pub fn request_time(&self) -> Duration {
        Instant::now() - self.0.borrow().request_start
    }

    /// Returns human readable representing request time.
    pub fn request_time_as_string(&self) -> String {
        let us = self.request_time().as_micros();
        if us > 5000 {
            format!("{}ms", us / 1000)
        } else {
            format!("{}μs", us)
        }
    }
}

/// This implementation is what actually provides the `client: ClientCtx` in the parameters of route functions.
impl FromRequest for ClientCtx {
    type Error = Error;
    type Future = Ready<Result<Self, Self::Error>>;

    fn from_request(req: &HttpRequest, _: &mut Payload) -> Self::Future {
        ok(ClientCtx::get_client_ctx(&mut req.extensions_mut()))
    }
}

impl<S, B> Transform<S, ServiceRequest> for ClientCtx
where
    S: Service<ServiceRequest, Response = ServiceResponse<B>, Error = Error>,
    S::Future: 'static,
    B: 'static,
{
    type Response = ServiceResponse<B>;
    type Error = Error;
    type Transform = ClientCtxMiddleware<S>;
    type InitError = ();
    type Future = Ready<Result<Self::Transform, Self::InitError>>;

    fn new_transform(&self, service: S) -> Self::Future {
        ok(ClientCtxMiddleware { service })
    }
}

/// Client context middleware
pub struct ClientCtxMiddleware<S> {
    service: S,
}

impl<S, B> Service<ServiceRequest> for ClientCtxMiddleware<S>
where
    S: Service<ServiceRequest, Response = ServiceResponse<B>, Error = Error>,
    S::Future: 'static,
    B: 'static,
{
    type Response = ServiceResponse<B>;
    type Error = Error;
    type Future = LocalBoxFuture<'static, Result<Self::Response, Self::Error>>;

    forward_ready!(service);

    fn call(&self, req: ServiceRequest) -> Self::Future {
        // The session must be pulled before the wrapped service takes `req`,
        // and the ctx has to land in extensions before extractors run.
        let session = req.get_session();
        let ctx = ClientCtx::get_client_ctx(&mut req.extensions_mut());
        let fut = self.service.call(req);

        async move {
            let client = authenticate_by_session(&session).await;
            ctx.0.borrow_mut().client = client;
            Ok(fut.await?)
        }
        .boxed_local()
    }
}

/// Wraps a service so every request arrives already signed in as one
/// user, with session state never consulted. Service tests use this to
/// act as a member; the live stack resolves identity with the ClientCtx
/// transform instead.
pub struct AssumeIdentity(pub ClientUser);

impl<S, B> Transform<S, ServiceRequest> for AssumeIdentity
where
    S: Service<ServiceRequest, Response = ServiceResponse<B>, Error = Error>,
{
    type Response = ServiceResponse<B>;
    type Error = Error;
    type Transform = AssumeIdentityMiddleware<S>;
    type InitError = ();
    type Future = Ready<Result<Self::Transform, Self::InitError>>;

    fn new_transform(&self, service: S) -> Self::Future {
        ok(AssumeIdentityMiddleware {
            service,
            user: self.0.clone(),
        })
    }
}

pub struct AssumeIdentityMiddleware<S> {
    service: S,
    user: ClientUser,
}

impl<S, B> Service<ServiceRequest> for AssumeIdentityMiddleware<S>
where
    S: Service<ServiceRequest, Response = ServiceResponse<B>, Error = Error>,
{
    type Response = ServiceResponse<B>;
    type Error = Error;
    type Future = S::Future;

    forward_ready!(service);

    fn call(&self, req: ServiceRequest) -> Self::Future {
        let ctx = ClientCtx::get_client_ctx(&mut req.extensions_mut());
        ctx.0.borrow_mut().client = Some(self.user.clone());
        self.service.call(req)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn alice() -> ClientUser {
        ClientUser {
            id: 7,
            name: "alice".to_owned(),
        }
    }

    fn draft_by(author_id: i32) -> PostForTemplate {
        let day_one = chrono::NaiveDate::from_ymd_opt(2024, 1, 1)
            .unwrap()
            .and_hms_opt(0, 0, 0)
            .unwrap();
        PostForTemplate {
            id: 1,
            title: "Draft".to_owned(),
            text: "Body".to_owned(),
            pub_date: day_one,
            author_id,
            category_id: None,
            location_id: None,
            image: None,
            is_published: false,
            created_at: day_one,
            author: "alice".to_owned(),
            category_title: None,
            category_slug: None,
            category_is_published: None,
            location_name: None,
            comment_count: 0,
        }
    }

    #[test]
    fn guests_own_nothing() {
        let ctx = ClientCtx::new();
        assert!(!ctx.is_user());
        assert_eq!(ctx.get_id(), None);
        assert_eq!(ctx.get_name(), "Guest");
        assert!(!ctx.owns(7));
    }

    #[test]
    fn members_own_exactly_their_own_rows() {
        let ctx = ClientCtx::with_user(alice());
        assert!(ctx.is_user());
        assert_eq!(ctx.get_id(), Some(7));
        assert_eq!(ctx.get_name(), "alice");
        assert!(ctx.owns(7));
        assert!(!ctx.owns(8));
    }

    #[test]
    fn only_the_author_may_preview_a_draft() {
        let author = ClientCtx::with_user(alice());
        assert!(author.can_view_post(&draft_by(7)));
        assert!(!author.can_view_post(&draft_by(8)));
        assert!(!ClientCtx::new().can_view_post(&draft_by(7)));
    }
}
