mod auth;
mod db;
mod error;
mod google;
mod mailer;
mod models;
mod reservations;
mod routes;
mod state;
mod upload;

use actix_files::Files;
use actix_web::{middleware, web, App, HttpServer};
use sqlx::sqlite::{SqliteConnectOptions, SqlitePoolOptions};
use std::env;
use std::str::FromStr;

use crate::mailer::{MailQueue, MailerConfig};
use crate::state::{AppState, GoogleConfig, JwtConfig};

#[actix_web::main]
async fn main() -> std::io::Result<()> {
    if let Err(err) = run().await {
        eprintln!("Startup error: {err}");
        std::process::exit(1);
    }
    Ok(())
}

async fn run() -> Result<(), Box<dyn std::error::Error>> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info"))
        .init();

    let db_url = env::var("DATABASE_URL").unwrap_or_else(|_| "sqlite://./data/lunabrew.db".to_string());
    db::ensure_sqlite_dir(&db_url)?;
    std::fs::create_dir_all(upload::UPLOAD_DIR)?;
    std::fs::create_dir_all("./public")?;

    let connect_options = SqliteConnectOptions::from_str(&db_url)?
        .create_if_missing(true);

    let pool = SqlitePoolOptions::new()
        .max_connections(5)
        .connect_with(connect_options)
        .await?;

    db::run_migrations(&pool).await?;
    db::seed_defaults(&pool).await?;

    let (mail, mail_rx) = MailQueue::new();
    actix_web::rt::spawn(mailer::run_worker(MailerConfig::from_env(), mail_rx));

    let state = AppState {
        db: pool.clone(),
        jwt: JwtConfig::from_env(),
        mail,
        google: GoogleConfig::from_env(),
    };

    let port: u16 = env::var("PORT")
        .ok()
        .and_then(|value| value.parse().ok())
        .unwrap_or(3000);

    let address = format!("0.0.0.0:{port}");
    log::info!("Starting LunaBrew on http://{address}");

    HttpServer::new(move || {
        App::new()
            .app_data(web::Data::new(state.clone()))
            .wrap(middleware::Logger::default())
            .configure(routes::public::configure)
            .configure(routes::admin::configure)
            .service(Files::new("/uploads", upload::UPLOAD_DIR))
            .service(Files::new("/", "./public").index_file("index.html").prefer_utf8(true))
    })
    .bind(address)?
    .run()
    .await?;

    Ok(())
}
