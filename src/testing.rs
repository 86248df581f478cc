//! Throwaway database and upload directory for route tests.

use std::path::{Path, PathBuf};

use actix_http::Request;
use actix_web::{
    body::MessageBody,
    cookie::Cookie,
    dev::{Service, ServiceFactory, ServiceRequest, ServiceResponse},
    http::header,
    test, web, App,
};
use bytesize::ByteSize;
use sqlx::{sqlite::SqlitePoolOptions, Pool, Sqlite};

use crate::{auth, config::Config, model, util};

pub const PASSWORD: &str = "correct horse battery";

pub const PNG: &[u8] = b"\x89PNG\r\n\x1a\n\0\0\0\rIHDR\0\0\0\x01\0\0\0\x01";
pub const GIF: &[u8] = b"GIF89a\x01\0\x01\0\x80\0\0\0\0\0\xff\xff\xff";

const BOUNDARY: &str = "mateugram-test-boundary";

pub struct TestEnv {
    pub dir: PathBuf,
    pub sql: Pool<Sqlite>,
    pub config: Config,
}

impl TestEnv {
    pub async fn new() -> Self {
        Self::with_max_upload(ByteSize::mib(1)).await
    }

    pub async fn with_max_upload(max_upload: ByteSize) -> Self {
        let dir = std::env::temp_dir().join(format!("mateugram-{}", util::generate_file_prefix()));
        std::fs::create_dir_all(dir.join("uploads")).unwrap();

        let mut config = Config::from_lookup(|_| None).unwrap();
        config.database_url = format!("sqlite://{}?mode=rwc", dir.join("db.sqlite").display());
        config.upload_dir = dir.join("uploads");
        config.max_upload = max_upload;

        let sql = SqlitePoolOptions::new()
            .max_connections(1)
            .connect(&config.database_url)
            .await
            .unwrap();

        sqlx::migrate!("./migrations").run(&sql).await.unwrap();

        Self { dir, sql, config }
    }

    pub fn upload_dir(&self) -> &Path {
        &self.config.upload_dir
    }

    pub fn app(
        &self,
    ) -> App<
        impl ServiceFactory<
            ServiceRequest,
            Config = (),
            Response = ServiceResponse,
            Error = actix_web::Error,
            InitError = (),
        >,
    > {
        App::new()
            .app_data(web::Data::new(self.sql.clone()))
            .app_data(web::Data::new(self.config.clone()))
            .configure(crate::configure)
    }

    /// Inserts an active user with `PASSWORD` and returns their id.
    pub async fn register(&self, username: &str, password: &str) -> i64 {
        let hash = auth::hash_password(password).unwrap();

        sqlx::query("INSERT INTO users (username, email, password, created) VALUES (?, ?, ?, ?)")
            .bind(username)
            .bind(format!("{username}@example.com"))
            .bind(hash)
            .bind(model::now())
            .execute(&self.sql)
            .await
            .unwrap()
            .last_insert_rowid()
    }

    pub async fn login(&self, id: i64) -> String {
        let user = sqlx::query_as::<_, model::User>("SELECT * FROM users WHERE id = ?")
            .bind(id)
            .fetch_one(&self.sql)
            .await
            .unwrap();

        auth::start_session(&self.sql, &user, self.config.session_ttl).await.unwrap()
    }

    /// A registered, logged-in user: `(id, session token)`.
    pub async fn member(&self, username: &str) -> (i64, String) {
        let id = self.register(username, PASSWORD).await;
        let token = self.login(id).await;
        (id, token)
    }

    /// A post by `owner` with a stored image: `(post id, stored name)`.
    pub async fn post(&self, owner: i64, caption: &str) -> (i64, String) {
        let name = format!("{}_test.png", util::generate_file_prefix());
        std::fs::write(self.upload_dir().join(&name), PNG).unwrap();

        let id = sqlx::query(
            "INSERT INTO posts (owner, caption, image, mime, created) VALUES (?, ?, ?, 'image/png', ?)",
        )
        .bind(owner)
        .bind(caption)
        .bind(&name)
        .bind(model::now())
        .execute(&self.sql)
        .await
        .unwrap()
        .last_insert_rowid();

        (id, name)
    }
}

impl Drop for TestEnv {
    fn drop(&mut self) {
        let _ = std::fs::remove_dir_all(&self.dir);
    }
}

pub fn token_cookie(token: &str) -> Cookie<'static> {
    Cookie::new("token", token.to_owned())
}

pub async fn post_form<S, B>(
    app: &S,
    uri: &str,
    fields: &[(&str, &str)],
    token: Option<&str>,
) -> ServiceResponse<B>
where
    S: Service<Request, Response = ServiceResponse<B>, Error = actix_web::Error>,
{
    let mut req = test::TestRequest::post().uri(uri).set_form(fields);

    if let Some(token) = token {
        req = req.cookie(token_cookie(token));
    }

    test::call_service(app, req.to_request()).await
}

pub fn multipart_body(fields: &[(&str, &str)], file: Option<(&str, &str, &[u8])>) -> Vec<u8> {
    let mut body = Vec::new();

    for (name, value) in fields {
        body.extend_from_slice(
            format!(
                "--{BOUNDARY}\r\nContent-Disposition: form-data; name=\"{name}\"\r\n\r\n{value}\r\n"
            )
            .as_bytes(),
        );
    }

    if let Some((name, filename, data)) = file {
        body.extend_from_slice(
            format!(
                "--{BOUNDARY}\r\nContent-Disposition: form-data; name=\"{name}\"; filename=\"{filename}\"\r\nContent-Type: application/octet-stream\r\n\r\n"
            )
            .as_bytes(),
        );
        body.extend_from_slice(data);
        body.extend_from_slice(b"\r\n");
    }

    body.extend_from_slice(format!("--{BOUNDARY}--\r\n").as_bytes());
    body
}

pub async fn post_multipart<S, B>(
    app: &S,
    uri: &str,
    fields: &[(&str, &str)],
    file: Option<(&str, &str, &[u8])>,
    token: &str,
) -> ServiceResponse<B>
where
    S: Service<Request, Response = ServiceResponse<B>, Error = actix_web::Error>,
{
    let req = test::TestRequest::post()
        .uri(uri)
        .insert_header((
            header::CONTENT_TYPE,
            format!("multipart/form-data; boundary={BOUNDARY}"),
        ))
        .cookie(token_cookie(token))
        .set_payload(multipart_body(fields, file))
        .to_request();

    test::call_service(app, req).await
}

pub fn location<B>(resp: &ServiceResponse<B>) -> String {
    resp.headers()
        .get(header::LOCATION)
        .and_then(|x| x.to_str().ok())
        .unwrap_or_default()
        .to_owned()
}

pub fn cookie<B>(resp: &ServiceResponse<B>, name: &str) -> Option<String> {
    resp.response()
        .cookies()
        .find(|x| x.name() == name)
        .map(|x| x.value().to_owned())
}

pub fn flash<B>(resp: &ServiceResponse<B>) -> Option<String> {
    cookie(resp, crate::flash::COOKIE)
}

/// Renders a page and returns its HTML.
pub async fn page<S, B>(app: &S, uri: &str, token: Option<&str>) -> (actix_web::http::StatusCode, String)
where
    S: Service<Request, Response = ServiceResponse<B>, Error = actix_web::Error>,
    B: MessageBody,
{
    let mut req = test::TestRequest::get().uri(uri);

    if let Some(token) = token {
        req = req.cookie(token_cookie(token));
    }

    let resp = test::call_service(app, req.to_request()).await;
    let status = resp.status();
    let body = test::read_body(resp).await;

    (status, String::from_utf8_lossy(&body).into_owned())
}
