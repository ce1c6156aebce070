use actix_session::{storage::CookieSessionStore, SessionMiddleware};
use actix_web::cookie::Key;
use actix_web::http::StatusCode;
use actix_web::middleware::{ErrorHandlers, Logger};
use actix_web::{App, HttpServer};
use anyhow::Context;
use env_logger::Env;
use rublog::db::init_db;
use rublog::middleware::ClientCtx;

#[actix_web::main]
async fn main() -> anyhow::Result<()> {
    init_lib_mods();
    init_our_mods();
    init_db(std::env::var("DATABASE_URL").context("DATABASE_URL must be set.")?).await;

    let secret_key = session_secret();
    let bind_addr = std::env::var("BIND_ADDR").unwrap_or_else(|_| "127.0.0.1:8080".to_owned());
    log::info!("Serving on {}", bind_addr);

    HttpServer::new(move || {
        // Order of middleware IS IMPORTANT and is in REVERSE EXECUTION ORDER.
        // However, services are read top->down, higher traffic routes should be
        // placed higher
        App::new()
            .wrap(
                ErrorHandlers::new()
                    .handler(StatusCode::NOT_FOUND, rublog::web::error::render_404)
                    .handler(
                        StatusCode::INTERNAL_SERVER_ERROR,
                        rublog::web::error::render_500,
                    ),
            )
            .wrap(ClientCtx::default())
            .wrap(SessionMiddleware::new(
                CookieSessionStore::default(),
                secret_key.clone(),
            ))
            .wrap(Logger::new("%a %{User-Agent}i"))
            .configure(rublog::web::configure)
    })
    .bind(&bind_addr)?
    .run()
    .await?;

    Ok(())
}

/// Initialize third party crates we rely on but don't have control over.
fn init_lib_mods() {
    // This should be calls to crates without any transformative work applied.
    dotenv::dotenv().ok();
    env_logger::Builder::from_env(Env::default().default_filter_or("info")).init();
}

/// Initialize all local mods.
fn init_our_mods() {
    // This should be a list of simple function calls.
    // Each module should work mostly independent of others.
    // This way, we can unit test individual modules without loading the entire application.
    rublog::filesystem::init();
}

/// The cookie signing key, from SESSION_SECRET when one is configured.
/// A generated key works too, but logs everyone out on restart.
fn session_secret() -> Key {
    match std::env::var("SESSION_SECRET") {
        Ok(secret) if secret.len() >= 64 => Key::from(secret.as_bytes()),
        Ok(_) => {
            log::warn!("SESSION_SECRET is shorter than 64 bytes; generating a key instead.");
            Key::generate()
        }
        Err(_) => {
            log::warn!("SESSION_SECRET is not set; sessions will not survive a restart.");
            Key::generate()
        }
    }
}
