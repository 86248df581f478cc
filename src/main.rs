use std::{io, str::FromStr};

use actix_web::{middleware::Logger, web, App, HttpServer};
use log::info;
use sqlx::sqlite::{SqliteConnectOptions, SqlitePoolOptions};

mod auth;
mod config;
mod error;
mod flash;
mod model;
mod pages;
mod posts;
mod upload;
mod users;
mod util;
mod validation;

#[cfg(test)]
mod testing;

pub fn configure(cfg: &mut web::ServiceConfig) {
    cfg.configure(users::configure)
        .configure(posts::configure)
        .configure(pages::configure);
}

#[actix_web::main]
async fn main() -> io::Result<()> {
    dotenv::dotenv().ok();
    env_logger::init_from_env(env_logger::Env::new().default_filter_or("info"));

    let config = config::Config::from_env()
        .map_err(|e| io::Error::new(io::ErrorKind::InvalidInput, e))?;

    tokio::fs::create_dir_all(&config.upload_dir).await?;

    let options = SqliteConnectOptions::from_str(&config.database_url)
        .map_err(|e| io::Error::new(io::ErrorKind::InvalidInput, e))?
        .create_if_missing(true)
        .foreign_keys(true);

    let sql = SqlitePoolOptions::new()
        .connect_with(options)
        .await
        .map_err(|e| io::Error::new(io::ErrorKind::Other, e))?;

    sqlx::migrate!("./migrations")
        .run(&sql)
        .await
        .map_err(|e| io::Error::new(io::ErrorKind::Other, e))?;

    info!(
        "MateuGram listening on {}:{}, storing uploads in {}",
        config.bind_addr,
        config.port,
        config.upload_dir.display()
    );

    let bind = (config.bind_addr.clone(), config.port);

    HttpServer::new(move || {
        App::new()
            .wrap(Logger::new(
                "%a \"%r\" %s %b \"%{Referer}i\" \"%{User-Agent}i\" %T",
            ))
            .app_data(web::Data::new(sql.clone()))
            .app_data(web::Data::new(config.clone()))
            .configure(configure)
    })
    .bind(bind)?
    .run()
    .await
}
