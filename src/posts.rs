use std::io;

use actix_multipart::Multipart;
use actix_web::{get, http::header, post, web, HttpResponse};
use log::{debug, warn};
use scopeguard::ScopeGuard;
use serde::Deserialize;
use sqlx::{Pool, Sqlite};

use crate::{
    auth::{self, Session},
    config::Config,
    error::AppError,
    flash,
    model::{self, Comment, Post},
    upload::{self, ImageKind},
    validation,
};

async fn find_post(sql: &Pool<Sqlite>, id: i64) -> Result<Post, AppError> {
    Post::by_id(sql, id)
        .await?
        .ok_or_else(|| AppError::NotFound("no such post".into()))
}

#[post("/posts")]
async fn create(
    payload: Multipart,
    sql: web::Data<Pool<Sqlite>>,
    config: web::Data<Config>,
    session: Session,
) -> Result<HttpResponse, AppError> {
    let form = upload::receive_form(payload, "image", config.max_upload).await?;

    let caption = form.field("caption").trim().to_owned();

    if let Err(x) = validation::caption(&caption) {
        return Ok(flash::redirect("/", x));
    }

    let file = match form.file {
        Some(x) => x,
        None => return Ok(flash::redirect("/", "no image selected")),
    };

    let stored = match upload::store_image(&config.upload_dir, &file).await {
        Ok(x) => x,
        Err(AppError::BadRequest(x)) => return Ok(flash::redirect("/", &x)),
        Err(x) => return Err(x),
    };

    let guard = scopeguard::guard(stored.name.clone(), |name| {
        let _ = std::fs::remove_file(config.upload_dir.join(name));
    });

    let id = sqlx::query(
        "INSERT INTO posts (owner, caption, image, mime, created) VALUES (?, ?, ?, ?, ?)",
    )
    .bind(session.user.id)
    .bind(&caption)
    .bind(&stored.name)
    .bind(stored.kind.mime().to_string())
    .bind(model::now())
    .execute(&**sql)
    .await?
    .last_insert_rowid();

    ScopeGuard::into_inner(guard);

    debug!("{} posted {} as post {id}", session.user.username, stored.name);

    Ok(flash::to(&format!("/p/{id}")))
}

#[post("/p/{id}/delete")]
async fn delete(
    id: web::Path<i64>,
    sql: web::Data<Pool<Sqlite>>,
    config: web::Data<Config>,
    session: Session,
) -> Result<HttpResponse, AppError> {
    let post = find_post(&sql, *id).await?;

    if !auth::can_modify(&session.user, post.owner) {
        warn!("{} tried to delete post {}", session.user.username, post.id);
        return Err(AppError::Forbidden("that post isn't yours".into()));
    }

    sqlx::query("DELETE FROM posts WHERE id = ?")
        .bind(post.id)
        .execute(&**sql)
        .await?;

    let _ = upload::remove(&config.upload_dir, &post.image).await;

    Ok(flash::redirect(
        &format!("/u/{}", session.user.username),
        "post deleted",
    ))
}

#[post("/p/{id}/like")]
async fn like(
    id: web::Path<i64>,
    sql: web::Data<Pool<Sqlite>>,
    session: Session,
) -> Result<HttpResponse, AppError> {
    let post = find_post(&sql, *id).await?;

    let inserted = sqlx::query("INSERT OR IGNORE INTO likes (post, user, created) VALUES (?, ?, ?)")
        .bind(post.id)
        .bind(session.user.id)
        .bind(model::now())
        .execute(&**sql)
        .await?
        .rows_affected();

    // already liked, so this click takes it back
    if inserted == 0 {
        sqlx::query("DELETE FROM likes WHERE post = ? AND user = ?")
            .bind(post.id)
            .bind(session.user.id)
            .execute(&**sql)
            .await?;
    }

    Ok(flash::to(&format!("/p/{}", post.id)))
}

#[derive(Deserialize)]
struct CommentForm {
    body: String,
}

#[post("/p/{id}/comments")]
async fn add_comment(
    id: web::Path<i64>,
    form: web::Form<CommentForm>,
    sql: web::Data<Pool<Sqlite>>,
    session: Session,
) -> Result<HttpResponse, AppError> {
    let post = find_post(&sql, *id).await?;
    let location = format!("/p/{}", post.id);

    if let Err(x) = validation::comment(&form.body) {
        return Ok(flash::redirect(&location, x));
    }

    sqlx::query("INSERT INTO comments (post, author, body, created) VALUES (?, ?, ?, ?)")
        .bind(post.id)
        .bind(session.user.id)
        .bind(form.body.trim())
        .bind(model::now())
        .execute(&**sql)
        .await?;

    Ok(flash::to(&location))
}

#[post("/comments/{id}/delete")]
async fn delete_comment(
    id: web::Path<i64>,
    sql: web::Data<Pool<Sqlite>>,
    session: Session,
) -> Result<HttpResponse, AppError> {
    let comment = sqlx::query_as::<_, Comment>("SELECT * FROM comments WHERE id = ?")
        .bind(*id)
        .fetch_optional(&**sql)
        .await?
        .ok_or_else(|| AppError::NotFound("no such comment".into()))?;

    let post = find_post(&sql, comment.post).await?;

    if !auth::can_modify(&session.user, comment.author) && !auth::can_modify(&session.user, post.owner) {
        warn!("{} tried to delete comment {}", session.user.username, comment.id);
        return Err(AppError::Forbidden("that comment isn't yours".into()));
    }

    sqlx::query("DELETE FROM comments WHERE id = ?")
        .bind(comment.id)
        .execute(&**sql)
        .await?;

    Ok(flash::redirect(&format!("/p/{}", post.id), "comment deleted"))
}

#[get("/uploads/{name}")]
async fn uploaded(name: web::Path<String>, config: web::Data<Config>) -> Result<HttpResponse, AppError> {
    let path = upload::stored_path(&config.upload_dir, &name)
        .ok_or_else(|| AppError::NotFound("no such file".into()))?;

    let data = match tokio::fs::read(&path).await {
        Ok(x) => x,
        Err(e) if e.kind() == io::ErrorKind::NotFound => {
            return Err(AppError::NotFound("no such file".into()));
        }
        Err(e) => return Err(e.into()),
    };

    let mime = ImageKind::from_extension(&name).map_or(mime::APPLICATION_OCTET_STREAM, ImageKind::mime);

    Ok(HttpResponse::Ok()
        .append_header((
            header::CONTENT_DISPOSITION,
            format!(
                "{}; filename=\"{}\"",
                if mime == mime::APPLICATION_OCTET_STREAM {
                    "attachment"
                } else {
                    "inline"
                },
                name.as_str()
            ),
        ))
        .append_header((header::CACHE_CONTROL, "public, max-age=31536000, immutable"))
        .append_header((header::X_CONTENT_TYPE_OPTIONS, "nosniff"))
        .content_type(mime)
        .body(data))
}

pub fn configure(cfg: &mut web::ServiceConfig) {
    cfg.service(create)
        .service(delete)
        .service(like)
        .service(add_comment)
        .service(delete_comment)
        .service(uploaded);
}
