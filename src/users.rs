use actix_multipart::Multipart;
use actix_web::{
    cookie::{Cookie, SameSite},
    http, post, web, HttpResponse,
};
use log::{info, warn};
use scopeguard::ScopeGuard;
use serde::Deserialize;
use sqlx::{Pool, Sqlite};

use crate::{
    auth::{self, Authenticatable, Session},
    config::Config,
    error::{self, AppError},
    flash, model::{self, User},
    upload, validation,
};

fn token_cookie(token: String) -> Cookie<'static> {
    Cookie::build("token", token)
        .path("/")
        .secure(true)
        .http_only(true)
        .same_site(SameSite::Strict)
        .finish()
}

fn logged_out(location: &str, message: &str) -> HttpResponse {
    let mut response = flash::redirect(location, message);

    if let Err(e) = response.add_removal_cookie(&Cookie::build("token", "").path("/").finish()) {
        warn!("unable to clear session cookie: {e}");
    }

    response
}

#[derive(Deserialize, Debug)]
struct LoginForm {
    pub username: String,
    pub password: String,
}

#[post("/login")]
async fn login(
    form: web::Form<LoginForm>,
    sql: web::Data<Pool<Sqlite>>,
    config: web::Data<Config>,
    session: Option<Session>,
) -> Result<HttpResponse, AppError> {
    if session.is_some() {
        return Ok(flash::to("/"));
    }

    let user = match User::by_username(&sql, &form.username).await? {
        Some(x) if x.is_active() => x,
        _ => {
            // unknown names take as long as wrong passwords
            auth::verify_decoy(&form.password);
            return Ok(flash::redirect("/login", "login failed"));
        }
    };

    if auth::verify_password(form.password.as_str(), user.password.as_str()).is_err() {
        warn!("failed login for {}", user.username);
        return Ok(flash::redirect("/login", "login failed"));
    }

    let token = auth::start_session(&sql, &user, config.session_ttl).await?;

    info!("{} logged in", user.username);

    Ok(HttpResponse::Found()
        .cookie(token_cookie(token))
        .append_header((http::header::LOCATION, "/"))
        .finish())
}

#[post("/logout")]
async fn logout(session: Session, sql: web::Data<Pool<Sqlite>>) -> Result<HttpResponse, AppError> {
    auth::end_session(&sql, &session.token).await?;

    Ok(logged_out("/login", "logged out"))
}

#[derive(Deserialize)]
struct RegistrationForm {
    username: String,
    email: String,
    password: String,
}

#[post("/register")]
async fn register(
    form: web::Form<RegistrationForm>,
    sql: web::Data<Pool<Sqlite>>,
    session: Option<Session>,
) -> Result<HttpResponse, AppError> {
    if session.is_some() {
        return Ok(flash::to("/"));
    }

    let email = form.email.trim().to_lowercase();

    if let Err(x) = validation::username(&form.username)
        .and_then(|_| validation::email(&email))
        .and_then(|_| validation::password(&form.password))
    {
        return Ok(flash::redirect("/register", x));
    }

    let hash = auth::hash_password(form.password.as_str())?;

    let taken = sqlx::query_scalar::<_, bool>(
        "SELECT EXISTS (SELECT 1 FROM users WHERE username = ? COLLATE NOCASE OR email = ?)",
    )
    .bind(&form.username)
    .bind(&email)
    .fetch_one(&**sql)
    .await?;

    if taken {
        return Ok(flash::redirect("/register", "username or email already taken"));
    }

    match sqlx::query(
        "INSERT INTO users (username, email, password, created) VALUES (?, ?, ?, ?)",
    )
    .bind(&form.username)
    .bind(&email)
    .bind(hash)
    .bind(model::now())
    .execute(&**sql)
    .await
    {
        Ok(_) => {}
        // lost a race against a concurrent registration
        Err(x) if error::is_unique_violation(&x) => {
            return Ok(flash::redirect("/register", "username or email already taken"));
        }
        Err(x) => return Err(x.into()),
    }

    info!("registered {}", form.username);

    Ok(flash::redirect("/login", "registration successful"))
}

#[derive(Deserialize)]
struct SettingsForm {
    display_name: String,
    bio: String,
}

#[post("/settings")]
async fn update_settings(
    form: web::Form<SettingsForm>,
    sql: web::Data<Pool<Sqlite>>,
    session: Session,
) -> Result<HttpResponse, AppError> {
    let display_name = form.display_name.trim();
    let bio = form.bio.trim();

    if let Err(x) = validation::display_name(display_name).and_then(|_| validation::bio(bio)) {
        return Ok(flash::redirect("/settings", x));
    }

    sqlx::query("UPDATE users SET display_name = ?, bio = ? WHERE id = ?")
        .bind(display_name)
        .bind(bio)
        .bind(session.user.id)
        .execute(&**sql)
        .await?;

    Ok(flash::redirect("/settings", "profile updated"))
}

#[post("/avatar")]
async fn update_avatar(
    payload: Multipart,
    sql: web::Data<Pool<Sqlite>>,
    config: web::Data<Config>,
    session: Session,
) -> Result<HttpResponse, AppError> {
    let form = upload::receive_form(payload, "avatar", config.max_upload).await?;

    let file = match form.file {
        Some(x) => x,
        None => return Ok(flash::redirect("/settings", "no image selected")),
    };

    let stored = match upload::store_image(&config.upload_dir, &file).await {
        Ok(x) => x,
        Err(AppError::BadRequest(x)) => return Ok(flash::redirect("/settings", &x)),
        Err(x) => return Err(x),
    };

    // drop the new file again unless the row points at it
    let guard = scopeguard::guard(stored.name.clone(), |name| {
        let _ = std::fs::remove_file(config.upload_dir.join(name));
    });

    sqlx::query("UPDATE users SET avatar = ? WHERE id = ?")
        .bind(&stored.name)
        .bind(session.user.id)
        .execute(&**sql)
        .await?;

    ScopeGuard::into_inner(guard);

    if let Some(old) = &session.user.avatar {
        let _ = upload::remove(&config.upload_dir, old).await;
    }

    Ok(flash::redirect("/settings", "avatar updated"))
}

#[derive(Deserialize)]
struct PasswordForm {
    current: String,
    new: String,
}

#[post("/password")]
async fn change_password(
    form: web::Form<PasswordForm>,
    sql: web::Data<Pool<Sqlite>>,
    session: Session,
) -> Result<HttpResponse, AppError> {
    if auth::verify_password(&form.current, &session.user.password).is_err() {
        return Ok(flash::redirect("/settings", "current password is wrong"));
    }

    if let Err(x) = validation::password(&form.new) {
        return Ok(flash::redirect("/settings", x));
    }

    let hash = auth::hash_password(&form.new)?;

    sqlx::query("UPDATE users SET password = ? WHERE id = ?")
        .bind(hash)
        .bind(session.user.id)
        .execute(&**sql)
        .await?;

    let ended = auth::end_other_sessions(&sql, session.user.id, Some(session.token.as_str())).await?;

    info!("{} changed their password, ended {ended} other sessions", session.user.username);

    Ok(flash::redirect("/settings", "password changed"))
}

#[derive(Deserialize)]
struct DeactivateForm {
    password: String,
}

#[post("/deactivate")]
async fn deactivate(
    form: web::Form<DeactivateForm>,
    sql: web::Data<Pool<Sqlite>>,
    session: Session,
) -> Result<HttpResponse, AppError> {
    if auth::verify_password(&form.password, &session.user.password).is_err() {
        return Ok(flash::redirect("/settings", "password is wrong"));
    }

    sqlx::query("UPDATE users SET active = 0 WHERE id = ?")
        .bind(session.user.id)
        .execute(&**sql)
        .await?;

    auth::end_other_sessions(&sql, session.user.id, None).await?;

    info!("{} deactivated their account", session.user.username);

    Ok(logged_out("/login", "account deactivated"))
}

async fn followee(sql: &Pool<Sqlite>, username: &str) -> Result<User, AppError> {
    match User::by_username(sql, username).await? {
        Some(x) if x.is_active() => Ok(x),
        _ => Err(AppError::NotFound(format!("no user named {username}"))),
    }
}

#[post("/u/{username}/follow")]
async fn follow(
    username: web::Path<String>,
    sql: web::Data<Pool<Sqlite>>,
    session: Session,
) -> Result<HttpResponse, AppError> {
    let target = followee(&sql, &username).await?;
    let location = format!("/u/{}", target.username);

    if target.id == session.user.id {
        warn!("{} tried to follow themselves", session.user.username);
        return Ok(flash::redirect(&location, "you can't follow yourself"));
    }

    sqlx::query("INSERT OR IGNORE INTO follows (follower, followed, created) VALUES (?, ?, ?)")
        .bind(session.user.id)
        .bind(target.id)
        .bind(model::now())
        .execute(&**sql)
        .await?;

    Ok(flash::to(&location))
}

#[post("/u/{username}/unfollow")]
async fn unfollow(
    username: web::Path<String>,
    sql: web::Data<Pool<Sqlite>>,
    session: Session,
) -> Result<HttpResponse, AppError> {
    let target = followee(&sql, &username).await?;

    sqlx::query("DELETE FROM follows WHERE follower = ? AND followed = ?")
        .bind(session.user.id)
        .bind(target.id)
        .execute(&**sql)
        .await?;

    Ok(flash::to(&format!("/u/{}", target.username)))
}

pub fn configure(cfg: &mut web::ServiceConfig) {
    let scope = web::scope("/users")
        .service(login)
        .service(logout)
        .service(register)
        .service(update_settings)
        .service(update_avatar)
        .service(change_password)
        .service(deactivate);

    cfg.service(scope).service(follow).service(unfollow);
}

#[cfg(test)]
mod tests {
    use actix_web::{http::StatusCode, test};

    use crate::testing::{self, TestEnv};

    #[actix_web::test]
    async fn register_then_login() {
        let env = TestEnv::new().await;
        let app = test::init_service(env.app()).await;

        let resp = testing::post_form(
            &app,
            "/users/register",
            &[("username", "mateu"), ("email", "Mateu@Example.com"), ("password", "hunter2hunter2")],
            None,
        )
        .await;
        assert_eq!(resp.status(), StatusCode::FOUND);
        assert_eq!(testing::location(&resp), "/login");
        assert_eq!(testing::flash(&resp).as_deref(), Some("registration successful"));

        let email: String = sqlx::query_scalar("SELECT email FROM users WHERE username = 'mateu'")
            .fetch_one(&env.sql)
            .await
            .unwrap();
        assert_eq!(email, "mateu@example.com");

        let password: String = sqlx::query_scalar("SELECT password FROM users WHERE username = 'mateu'")
            .fetch_one(&env.sql)
            .await
            .unwrap();
        assert_ne!(password, "hunter2hunter2");

        let resp = testing::post_form(
            &app,
            "/users/login",
            &[("username", "mateu"), ("password", "hunter2hunter2")],
            None,
        )
        .await;
        assert_eq!(resp.status(), StatusCode::FOUND);
        assert_eq!(testing::location(&resp), "/");
        let token = testing::cookie(&resp, "token").unwrap();
        assert_eq!(token.len(), 128);

        let req = test::TestRequest::get()
            .uri("/settings")
            .cookie(testing::token_cookie(&token))
            .to_request();
        let resp = test::call_service(&app, req).await;
        assert_eq!(resp.status(), StatusCode::OK);
    }

    #[actix_web::test]
    async fn register_rejects_bad_and_duplicate_input() {
        let env = TestEnv::new().await;
        let app = test::init_service(env.app()).await;
        env.register("mateu", "hunter2hunter2").await;

        let cases: [(&[(&str, &str)], &str); 4] = [
            (
                &[("username", "xd"), ("email", "xd@example.com"), ("password", "hunter2hunter2")],
                "username: length out of range",
            ),
            (
                &[("username", "someone"), ("email", "nope"), ("password", "hunter2hunter2")],
                "email: invalid address",
            ),
            (
                &[("username", "someone"), ("email", "s@example.com"), ("password", "short")],
                "password: too short",
            ),
            (
                &[("username", "mateu"), ("email", "other@example.com"), ("password", "hunter2hunter2")],
                "username or email already taken",
            ),
        ];

        for (fields, message) in cases {
            let resp = testing::post_form(&app, "/users/register", fields, None).await;
            assert_eq!(testing::location(&resp), "/register");
            assert_eq!(testing::flash(&resp).as_deref(), Some(message));
        }

        let users: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM users")
            .fetch_one(&env.sql)
            .await
            .unwrap();
        assert_eq!(users, 1);
    }

    #[actix_web::test]
    async fn login_failures_look_alike() {
        let env = TestEnv::new().await;
        let app = test::init_service(env.app()).await;
        env.register("mateu", "hunter2hunter2").await;

        for (username, password) in [("mateu", "wrongpassword"), ("nobody", "hunter2hunter2")] {
            let resp = testing::post_form(
                &app,
                "/users/login",
                &[("username", username), ("password", password)],
                None,
            )
            .await;
            assert_eq!(testing::location(&resp), "/login");
            assert_eq!(testing::flash(&resp).as_deref(), Some("login failed"));
            assert!(testing::cookie(&resp, "token").is_none());
        }
    }

    #[actix_web::test]
    async fn usernames_are_case_insensitive_and_path_safe() {
        let env = TestEnv::new().await;
        let app = test::init_service(env.app()).await;
        env.register("Anna", "hunter2hunter2").await;

        let cases = [
            ("anna", "anna@example.org", "username or email already taken"),
            ("%41nna", "percent@example.org", "username: disallowed characters"),
        ];

        for (username, email, message) in cases {
            let resp = testing::post_form(
                &app,
                "/users/register",
                &[("username", username), ("email", email), ("password", "hunter2hunter2")],
                None,
            )
            .await;
            assert_eq!(testing::flash(&resp).as_deref(), Some(message), "{username}");
        }

        let users: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM users")
            .fetch_one(&env.sql)
            .await
            .unwrap();
        assert_eq!(users, 1);

        // the path is decoded before lookup, so this can only ever name Anna
        let (status, body) = testing::page(&app, "/u/%41nna", None).await;
        assert_eq!(status, StatusCode::OK);
        assert!(body.contains("@Anna"));

        let duplicate = sqlx::query("INSERT INTO users (username, email, password, created) VALUES ('ANNA', 'x@example.org', '', 0)")
            .execute(&env.sql)
            .await
            .unwrap_err();
        assert!(crate::error::is_unique_violation(&duplicate));
    }

    #[actix_web::test]
    async fn login_purges_expired_sessions() {
        let env = TestEnv::new().await;
        let app = test::init_service(env.app()).await;
        let (id, _) = env.member("mateu").await;
        env.login(id).await;

        sqlx::query("UPDATE sessions SET created = created - ?")
            .bind(env.config.session_ttl)
            .execute(&env.sql)
            .await
            .unwrap();

        let resp = testing::post_form(
            &app,
            "/users/login",
            &[("username", "mateu"), ("password", testing::PASSWORD)],
            None,
        )
        .await;
        let token = testing::cookie(&resp, "token").unwrap();

        let sessions: Vec<String> = sqlx::query_scalar("SELECT token FROM sessions")
            .fetch_all(&env.sql)
            .await
            .unwrap();
        assert_eq!(sessions, vec![token]);
    }

    #[actix_web::test]
    async fn inactive_users_lose_open_sessions() {
        let env = TestEnv::new().await;
        let app = test::init_service(env.app()).await;
        let (id, token) = env.member("mateu").await;

        sqlx::query("UPDATE users SET active = 0 WHERE id = ?")
            .bind(id)
            .execute(&env.sql)
            .await
            .unwrap();

        let req = test::TestRequest::get()
            .uri("/settings")
            .cookie(testing::token_cookie(&token))
            .to_request();
        let resp = test::call_service(&app, req).await;
        assert_eq!(resp.status(), StatusCode::SEE_OTHER);
        assert_eq!(testing::location(&resp), "/login");

        let resp = testing::post_form(&app, "/u/mateu/follow", &[], Some(token.as_str())).await;
        assert_eq!(resp.status(), StatusCode::SEE_OTHER);

        let sessions: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM sessions WHERE user = ?")
            .bind(id)
            .fetch_one(&env.sql)
            .await
            .unwrap();
        assert_eq!(sessions, 1);
    }

    #[actix_web::test]
    async fn logout_ends_session() {
        let env = TestEnv::new().await;
        let app = test::init_service(env.app()).await;
        let (_, token) = env.member("mateu").await;

        let resp = testing::post_form(&app, "/users/logout", &[], Some(token.as_str())).await;
        assert_eq!(testing::location(&resp), "/login");
        assert_eq!(testing::cookie(&resp, "token").as_deref(), Some(""));

        let req = test::TestRequest::get()
            .uri("/settings")
            .cookie(testing::token_cookie(&token))
            .to_request();
        let resp = test::call_service(&app, req).await;
        assert_eq!(resp.status(), StatusCode::SEE_OTHER);
        assert_eq!(testing::location(&resp), "/login");
    }

    #[actix_web::test]
    async fn expired_sessions_are_rejected() {
        let env = TestEnv::new().await;
        let app = test::init_service(env.app()).await;
        let (_, token) = env.member("mateu").await;

        sqlx::query("UPDATE sessions SET created = created - ?")
            .bind(env.config.session_ttl + 1)
            .execute(&env.sql)
            .await
            .unwrap();

        let req = test::TestRequest::get()
            .uri("/settings")
            .cookie(testing::token_cookie(&token))
            .to_request();
        let resp = test::call_service(&app, req).await;
        assert_eq!(resp.status(), StatusCode::SEE_OTHER);
    }

    #[actix_web::test]
    async fn settings_update_profile() {
        let env = TestEnv::new().await;
        let app = test::init_service(env.app()).await;
        let (id, token) = env.member("mateu").await;

        let resp = testing::post_form(
            &app,
            "/users/settings",
            &[("display_name", "  Mateu M. "), ("bio", "photos of cats")],
            Some(token.as_str()),
        )
        .await;
        assert_eq!(testing::flash(&resp).as_deref(), Some("profile updated"));

        let (display_name, bio): (String, String) =
            sqlx::query_as("SELECT display_name, bio FROM users WHERE id = ?")
                .bind(id)
                .fetch_one(&env.sql)
                .await
                .unwrap();
        assert_eq!(display_name, "Mateu M.");
        assert_eq!(bio, "photos of cats");

        let long_bio = "x".repeat(301);
        let resp = testing::post_form(
            &app,
            "/users/settings",
            &[("display_name", "Mateu"), ("bio", &long_bio)],
            Some(token.as_str()),
        )
        .await;
        assert_eq!(testing::flash(&resp).as_deref(), Some("bio: too long"));
    }

    #[actix_web::test]
    async fn avatar_replaces_old_file() {
        let env = TestEnv::new().await;
        let app = test::init_service(env.app()).await;
        let (id, token) = env.member("mateu").await;

        let resp = testing::post_multipart(
            &app,
            "/users/avatar",
            &[],
            Some(("avatar", "me.png", testing::PNG)),
            &token,
        )
        .await;
        assert_eq!(testing::flash(&resp).as_deref(), Some("avatar updated"));

        let first: Option<String> = sqlx::query_scalar("SELECT avatar FROM users WHERE id = ?")
            .bind(id)
            .fetch_one(&env.sql)
            .await
            .unwrap();
        let first = first.unwrap();
        assert!(first.ends_with("_me.png"));
        assert!(env.upload_dir().join(&first).exists());

        testing::post_multipart(
            &app,
            "/users/avatar",
            &[],
            Some(("avatar", "me2.gif", testing::GIF)),
            &token,
        )
        .await;

        let second: Option<String> = sqlx::query_scalar("SELECT avatar FROM users WHERE id = ?")
            .bind(id)
            .fetch_one(&env.sql)
            .await
            .unwrap();
        let second = second.unwrap();
        assert!(second.ends_with("_me2.gif"));
        assert!(env.upload_dir().join(&second).exists());
        assert!(!env.upload_dir().join(&first).exists());
    }

    #[actix_web::test]
    async fn failed_avatar_update_removes_new_file() {
        let env = TestEnv::new().await;
        let app = test::init_service(env.app()).await;
        let (id, token) = env.member("mateu").await;

        sqlx::query(
            "CREATE TRIGGER frozen_avatar BEFORE UPDATE OF avatar ON users BEGIN SELECT RAISE(ABORT, 'disk full'); END",
        )
        .execute(&env.sql)
        .await
        .unwrap();

        let resp = testing::post_multipart(
            &app,
            "/users/avatar",
            &[],
            Some(("avatar", "me.png", testing::PNG)),
            &token,
        )
        .await;
        assert_eq!(resp.status(), StatusCode::INTERNAL_SERVER_ERROR);

        let avatar: Option<String> = sqlx::query_scalar("SELECT avatar FROM users WHERE id = ?")
            .bind(id)
            .fetch_one(&env.sql)
            .await
            .unwrap();
        assert!(avatar.is_none());
        assert_eq!(std::fs::read_dir(env.upload_dir()).unwrap().count(), 0);
    }

    #[actix_web::test]
    async fn avatar_rejects_non_images() {
        let env = TestEnv::new().await;
        let app = test::init_service(env.app()).await;
        let (_, token) = env.member("mateu").await;

        let resp = testing::post_multipart(
            &app,
            "/users/avatar",
            &[],
            Some(("avatar", "evil.png", b"<?php echo 1; ?>".as_slice())),
            &token,
        )
        .await;
        assert_eq!(
            testing::flash(&resp).as_deref(),
            Some("only png, jpeg, gif and webp images are accepted")
        );
        assert_eq!(std::fs::read_dir(env.upload_dir()).unwrap().count(), 0);
    }

    #[actix_web::test]
    async fn password_change_ends_other_sessions() {
        let env = TestEnv::new().await;
        let app = test::init_service(env.app()).await;
        let (id, token) = env.member("mateu").await;
        let other = env.login(id).await;

        let resp = testing::post_form(
            &app,
            "/users/password",
            &[("current", "wrongpassword"), ("new", "anotherpassword")],
            Some(token.as_str()),
        )
        .await;
        assert_eq!(testing::flash(&resp).as_deref(), Some("current password is wrong"));

        let resp = testing::post_form(
            &app,
            "/users/password",
            &[("current", testing::PASSWORD), ("new", "anotherpassword")],
            Some(token.as_str()),
        )
        .await;
        assert_eq!(testing::flash(&resp).as_deref(), Some("password changed"));

        let sessions: Vec<String> = sqlx::query_scalar("SELECT token FROM sessions WHERE user = ?")
            .bind(id)
            .fetch_all(&env.sql)
            .await
            .unwrap();
        assert_eq!(sessions, vec![token]);
        assert!(!sessions.contains(&other));

        let resp = testing::post_form(
            &app,
            "/users/login",
            &[("username", "mateu"), ("password", "anotherpassword")],
            None,
        )
        .await;
        assert!(testing::cookie(&resp, "token").is_some());
    }

    #[actix_web::test]
    async fn deactivated_accounts_disappear() {
        let env = TestEnv::new().await;
        let app = test::init_service(env.app()).await;
        let (_, token) = env.member("mateu").await;

        let resp = testing::post_form(
            &app,
            "/users/deactivate",
            &[("password", testing::PASSWORD)],
            Some(token.as_str()),
        )
        .await;
        assert_eq!(testing::flash(&resp).as_deref(), Some("account deactivated"));

        let sessions: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM sessions")
            .fetch_one(&env.sql)
            .await
            .unwrap();
        assert_eq!(sessions, 0);

        let resp = testing::post_form(
            &app,
            "/users/login",
            &[("username", "mateu"), ("password", testing::PASSWORD)],
            None,
        )
        .await;
        assert_eq!(testing::flash(&resp).as_deref(), Some("login failed"));

        let req = test::TestRequest::get().uri("/u/mateu").to_request();
        let resp = test::call_service(&app, req).await;
        assert_eq!(resp.status(), StatusCode::NOT_FOUND);
    }

    #[actix_web::test]
    async fn follow_and_unfollow() {
        let env = TestEnv::new().await;
        let app = test::init_service(env.app()).await;
        let (me, token) = env.member("mateu").await;
        let (them, _) = env.member("joana").await;

        for _ in 0..2 {
            let resp = testing::post_form(&app, "/u/joana/follow", &[], Some(token.as_str())).await;
            assert_eq!(testing::location(&resp), "/u/joana");
        }

        let follows: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM follows WHERE follower = ? AND followed = ?")
            .bind(me)
            .bind(them)
            .fetch_one(&env.sql)
            .await
            .unwrap();
        assert_eq!(follows, 1);

        let resp = testing::post_form(&app, "/u/mateu/follow", &[], Some(token.as_str())).await;
        assert_eq!(testing::flash(&resp).as_deref(), Some("you can't follow yourself"));

        let resp = testing::post_form(&app, "/u/nobody/follow", &[], Some(token.as_str())).await;
        assert_eq!(resp.status(), StatusCode::NOT_FOUND);

        testing::post_form(&app, "/u/joana/unfollow", &[], Some(token.as_str())).await;

        let follows: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM follows")
            .fetch_one(&env.sql)
            .await
            .unwrap();
        assert_eq!(follows, 0);
    }

    #[actix_web::test]
    async fn anonymous_cannot_follow() {
        let env = TestEnv::new().await;
        let app = test::init_service(env.app()).await;
        env.member("joana").await;

        let resp = testing::post_form(&app, "/u/joana/follow", &[], None).await;
        assert_eq!(resp.status(), StatusCode::SEE_OTHER);
        assert_eq!(testing::location(&resp), "/login");
    }
}
