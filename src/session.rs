use crate::db::get_db_pool;
use crate::user::{get_client_user_by_id, ClientUser};
use actix_session::Session;

/// Session key holding the logged-in user's id.
const UID_KEY: &str = "uid";

/// Resolves the request's cookie session into a known user, if any.
/// A cookie pointing at a user that no longer exists is purged.
pub async fn authenticate_by_session(session: &Session) -> Option<ClientUser> {
    let id = match session.get::<i32>(UID_KEY) {
        Ok(Some(id)) => id,
        Ok(None) => return None,
        Err(e) => {
            log::error!("authenticate_by_session: session.get(): {}", e);
            return None;
        }
    };

    match get_client_user_by_id(get_db_pool(), id).await {
        Ok(Some(user)) => Some(user),
        Ok(None) => {
            session.purge();
            None
        }
        Err(e) => {
            log::error!("authenticate_by_session: {}", e);
            None
        }
    }
}

/// Marks the session as belonging to the given user.
/// The session is renewed first so login rotates the cookie.
pub fn remember(session: &Session, user_id: i32) {
    session.renew();
    if let Err(e) = session.insert(UID_KEY, user_id) {
        log::error!("remember: session.insert(): {}", e);
    }
}

/// Drops all session state, logging the client out.
pub fn forget(session: &Session) {
    session.purge();
}
