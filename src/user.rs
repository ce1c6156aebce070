use crate::orm::users;
use argon2::{
    password_hash::{rand_core::OsRng, PasswordHash, SaltString},
    Argon2, PasswordHasher, PasswordVerifier,
};
use sea_orm::{entity::*, query::*, DatabaseConnection, DbErr, FromQueryResult, SqlErr};

/// A mini struct for holding only what identity data we need about a client.
#[derive(Clone, Debug, FromQueryResult)]
pub struct ClientUser {
    pub id: i32,
    pub name: String,
}

/// Profile data rendered on member pages and the profile form.
#[derive(Clone, Debug, FromQueryResult)]
pub struct UserProfile {
    pub id: i32,
    pub name: String,
    pub email: Option<String>,
    pub first_name: Option<String>,
    pub last_name: Option<String>,
    pub created_at: chrono::NaiveDateTime,
}

/// Credential row pulled for login checks. Never rendered.
#[derive(Debug, FromQueryResult)]
pub struct AuthUser {
    pub id: i32,
    pub name: String,
    pub password: String,
}

pub async fn get_client_user_by_id(
    db: &DatabaseConnection,
    id: i32,
) -> Result<Option<ClientUser>, DbErr> {
    users::Entity::find_by_id(id)
        .select_only()
        .column(users::Column::Id)
        .column(users::Column::Name)
        .into_model::<ClientUser>()
        .one(db)
        .await
}

pub async fn find_profile_by_name(
    db: &DatabaseConnection,
    name: &str,
) -> Result<Option<UserProfile>, DbErr> {
    users::Entity::find()
        .filter(users::Column::Name.eq(name))
        .into_model::<UserProfile>()
        .one(db)
        .await
}

pub async fn get_profile_by_id(
    db: &DatabaseConnection,
    id: i32,
) -> Result<Option<UserProfile>, DbErr> {
    users::Entity::find_by_id(id)
        .into_model::<UserProfile>()
        .one(db)
        .await
}

pub async fn find_auth_by_name(
    db: &DatabaseConnection,
    name: &str,
) -> Result<Option<AuthUser>, DbErr> {
    users::Entity::find()
        .filter(users::Column::Name.eq(name))
        .select_only()
        .column(users::Column::Id)
        .column(users::Column::Name)
        .column(users::Column::Password)
        .into_model::<AuthUser>()
        .one(db)
        .await
}

/// Hashes a password into the PHC string we store.
pub fn hash_password(password: &str) -> Result<String, argon2::password_hash::Error> {
    let salt = SaltString::generate(&mut OsRng);
    Ok(Argon2::default()
        .hash_password(password.as_bytes(), &salt)?
        .to_string())
}

/// Verifies a password attempt against a stored PHC string.
pub fn verify_password(password: &str, phc: &str) -> bool {
    match PasswordHash::new(phc) {
        Ok(parsed) => Argon2::default()
            .verify_password(password.as_bytes(), &parsed)
            .is_ok(),
        Err(e) => {
            log::error!("verify_password: stored hash unreadable: {}", e);
            false
        }
    }
}

/// True when a DbErr is the database rejecting a duplicate key,
/// which our schema only raises for taken usernames.
pub fn is_unique_violation(err: &DbErr) -> bool {
    matches!(err.sql_err(), Some(SqlErr::UniqueConstraintViolation(_)))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn password_roundtrip() {
        let phc = hash_password("hunter2").expect("hashing failed");
        assert!(phc.starts_with("$argon2"));
        assert!(verify_password("hunter2", &phc));
        assert!(!verify_password("hunter3", &phc));
    }

    #[test]
    fn garbage_phc_string_never_verifies() {
        assert!(!verify_password("hunter2", "not-a-phc-string"));
    }
}
