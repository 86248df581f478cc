//! One-shot messages carried in the `msg` cookie until the next page render.

use actix_web::{
    cookie::{Cookie, SameSite},
    http, HttpRequest, HttpResponse,
};
use log::warn;

pub const COOKIE: &str = "msg";

pub fn cookie(message: &str) -> Cookie<'static> {
    Cookie::build(COOKIE, message.to_owned())
        .path("/")
        .secure(true)
        .http_only(true)
        .same_site(SameSite::Strict)
        .finish()
}

/// `302 Found` to `location`, showing `message` there.
pub fn redirect(location: &str, message: &str) -> HttpResponse {
    HttpResponse::Found()
        .append_header((http::header::LOCATION, location))
        .cookie(cookie(message))
        .finish()
}

/// `302 Found` to `location` without a message.
pub fn to(location: &str) -> HttpResponse {
    HttpResponse::Found()
        .append_header((http::header::LOCATION, location))
        .finish()
}

pub fn take(req: &HttpRequest) -> Option<String> {
    req.cookie(COOKIE).map(|x| x.value().to_owned())
}

/// Expires the message so it is shown once.
pub fn clear(response: &mut HttpResponse) {
    let cookie = Cookie::build(COOKIE, "").path("/").finish();

    if let Err(e) = response.add_removal_cookie(&cookie) {
        warn!("unable to clear flash cookie: {e}");
    }
}

#[test]
fn redirect_sets_message() {
    let response = redirect("/login", "login failed");

    assert_eq!(response.status(), http::StatusCode::FOUND);
    assert_eq!(
        response.headers().get(http::header::LOCATION).unwrap(),
        "/login"
    );

    let msg = response.cookies().find(|x| x.name() == COOKIE).unwrap();
    assert_eq!(msg.value(), "login failed");
    assert_eq!(msg.path(), Some("/"));
    assert_eq!(msg.http_only(), Some(true));
}

#[test]
fn clear_expires_message() {
    let mut response = HttpResponse::Ok().finish();
    clear(&mut response);

    let msg = response.cookies().find(|x| x.name() == COOKIE).unwrap();
    assert_eq!(msg.value(), "");
    assert_eq!(msg.max_age(), Some(time::Duration::ZERO));
}
