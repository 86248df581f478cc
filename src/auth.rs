use std::pin::Pin;

use actix_web::{web, FromRequest};
use argon2::{
	password_hash::{rand_core::OsRng, PasswordHasher, PasswordVerifier, SaltString},
	Argon2, PasswordHash,
};
use futures_util::Future;
use log::debug;
use once_cell::sync::Lazy;
use sqlx::{Pool, Sqlite};

use crate::{config::Config, error::AppError, model::{self, User}, util};

pub fn hash_password(password: &str) -> Result<String, argon2::password_hash::Error> {
	let argon2 = Argon2::default();
	let salt = SaltString::generate(&mut OsRng);

	let hash = argon2
		.hash_password(password.as_bytes(), &salt)?
		.to_string();

	let parsed_hash = PasswordHash::new(&hash)?;

	// Verify hash immediately after creation
	argon2.verify_password(password.as_bytes(), &parsed_hash)?;

	Ok(hash)
}

pub fn verify_password(password: &str, hash: &str) -> Result<(), argon2::password_hash::Error> {
	Argon2::default().verify_password(password.as_bytes(), &PasswordHash::new(hash)?)
}

static DECOY_HASH: Lazy<Option<String>> = Lazy::new(|| hash_password("no account has this password").ok());

/// Spends the same argon2 work as a real check when there is no account to check against.
pub fn verify_decoy(password: &str) {
	if let Some(hash) = DECOY_HASH.as_deref() {
		let _ = verify_password(password, hash);
	}
}

/// Whatever can stand behind a request: a logged-in member or an anonymous visitor.
pub trait Authenticatable {
	/// Stable identity, `None` for visitors without an account.
	fn identity(&self) -> Option<i64>;

	fn is_active(&self) -> bool;

	fn is_anonymous(&self) -> bool;

	fn is_authenticated(&self) -> bool {
		!self.is_anonymous() && self.is_active()
	}
}

impl Authenticatable for User {
	fn identity(&self) -> Option<i64> {
		Some(self.id)
	}

	fn is_active(&self) -> bool {
		self.active
	}

	fn is_anonymous(&self) -> bool {
		false
	}
}

pub struct Anonymous;

impl Authenticatable for Anonymous {
	fn identity(&self) -> Option<i64> {
		None
	}

	fn is_active(&self) -> bool {
		false
	}

	fn is_anonymous(&self) -> bool {
		true
	}
}

/// Only the authenticated owner may change or remove what they own.
pub fn can_modify(actor: &dyn Authenticatable, owner: i64) -> bool {
	actor.is_authenticated() && actor.identity() == Some(owner)
}

/// The viewer of a page: the session's user if there is one.
pub fn viewer(session: &Option<Session>) -> &dyn Authenticatable {
	match session {
		Some(x) => &x.user,
		None => &Anonymous,
	}
}

pub struct Session {
	pub user: User,
	pub token: String,
}

impl FromRequest for Session {
	type Error = AppError;
	type Future = Pin<Box<dyn Future<Output = Result<Self, Self::Error>>>>;

	fn from_request(
		req: &actix_web::HttpRequest,
		_payload: &mut actix_web::dev::Payload,
	) -> Self::Future {
		let req = req.clone();
		Box::pin(async move {
			let sql = match req.app_data::<web::Data<Pool<Sqlite>>>() {
				Some(x) => x,
				None => return Err(AppError::Internal("unable to retrieve db".into())),
			};

			let ttl = req
				.app_data::<web::Data<Config>>()
				.map_or(60 * 60 * 24 * 7, |x| x.session_ttl);

			let token = match req.cookie("token") {
				Some(x) => x.value().to_owned(),
				None => return Err(AppError::Unauthorized),
			};

			let user = sqlx::query_as::<_, User>(
				"SELECT a.* FROM users a, sessions b WHERE b.token = ? AND (b.created + ?) > ? AND a.id = b.user",
			)
			.bind(&token)
			.bind(ttl)
			.bind(model::now())
			.fetch_optional(&***sql)
			.await?;

			match user {
				Some(user) if user.is_authenticated() => Ok(Session { user, token }),
				_ => Err(AppError::Unauthorized),
			}
		})
	}
}

/// Opens a session for `user`, dropping every session that outlived `ttl` on the way.
pub async fn start_session(sql: &Pool<Sqlite>, user: &User, ttl: i64) -> Result<String, sqlx::Error> {
	let token = util::generate_token();

	let expired = sqlx::query("DELETE FROM sessions WHERE (created + ?) <= ?")
		.bind(ttl)
		.bind(model::now())
		.execute(sql)
		.await?
		.rows_affected();

	if expired > 0 {
		debug!("purged {expired} expired sessions");
	}

	sqlx::query("INSERT INTO sessions (user, token, created) VALUES (?, ?, ?)")
		.bind(user.id)
		.bind(&token)
		.bind(model::now())
		.execute(sql)
		.await?;

	Ok(token)
}

pub async fn end_session(sql: &Pool<Sqlite>, token: &str) -> Result<(), sqlx::Error> {
	sqlx::query("DELETE FROM sessions WHERE token = ?")
		.bind(token)
		.execute(sql)
		.await?;

	Ok(())
}

/// Logs the user out everywhere except the session holding `keep`.
pub async fn end_other_sessions(sql: &Pool<Sqlite>, user: i64, keep: Option<&str>) -> Result<u64, sqlx::Error> {
	let result = sqlx::query("DELETE FROM sessions WHERE user = ? AND token != ?")
		.bind(user)
		.bind(keep.unwrap_or(""))
		.execute(sql)
		.await?;

	Ok(result.rows_affected())
}

#[cfg(test)]
fn member(active: bool) -> User {
	User {
		id: 7,
		username: "someone".into(),
		email: "someone@example.com".into(),
		password: String::new(),
		display_name: String::new(),
		bio: String::new(),
		avatar: None,
		active,
		created: 0,
	}
}

#[test]
fn password_hashing() {
	let hash = hash_password("correct horse battery").unwrap();

	assert!(hash.starts_with("$argon2"));
	assert_ne!(hash, "correct horse battery");
	verify_password("correct horse battery", &hash).unwrap();
	verify_password("wrong horse battery", &hash).unwrap_err();
	verify_password("correct horse battery", "not a phc string").unwrap_err();
}

#[test]
fn decoy_verification_runs() {
	assert!(DECOY_HASH.as_deref().map_or(false, |x| x.starts_with("$argon2")));
	verify_decoy("whatever");
}

#[test]
fn hashes_are_salted() {
	assert_ne!(hash_password("samepassword").unwrap(), hash_password("samepassword").unwrap());
}

#[test]
fn authenticatable_capability() {
	let user = member(true);
	assert_eq!(user.identity(), Some(7));
	assert!(user.is_authenticated());

	let inactive = member(false);
	assert!(!inactive.is_anonymous());
	assert!(!inactive.is_authenticated());

	assert_eq!(Anonymous.identity(), None);
	assert!(Anonymous.is_anonymous());
	assert!(!Anonymous.is_authenticated());
}

#[test]
fn modification_rights() {
	assert!(can_modify(&member(true), 7));
	assert!(!can_modify(&member(true), 8));
	assert!(!can_modify(&member(false), 7));
	assert!(!can_modify(&Anonymous, 7));
}
