use serde::Deserialize;
use time::{macros::format_description, OffsetDateTime};

use crate::model::PAGE_SIZE;

const TOKEN_CHARSET: &str = "abcdefghijklmnopqrstuvwxyzABCDEFGHIJKLMNOPQRSTUVWXYZ0123456789";

pub fn generate_token() -> String {
	// generate a unique 128-char token identifier.
	random_string::generate(128, TOKEN_CHARSET)
}

/// Random prefix that keeps stored upload names unique.
pub fn generate_file_prefix() -> String {
	random_string::generate(16, TOKEN_CHARSET)
}

pub fn format_timestamp(timestamp: i64) -> String {
	let format = format_description!("[day].[month].[year] [hour]:[minute]");

	OffsetDateTime::from_unix_timestamp(timestamp)
		.ok()
		.and_then(|x| x.format(&format).ok())
		.unwrap_or_default()
}

#[derive(Debug, Default, Deserialize)]
pub struct Page {
	pub page: Option<i64>,
}

impl Page {
	/// Clamped so that the row offset and the next page number stay in range.
	pub fn number(&self) -> i64 {
		self.page.unwrap_or(0).clamp(0, i64::MAX / PAGE_SIZE - 1)
	}
}

#[test]
fn tokens() {
	let token = generate_token();
	assert_eq!(token.len(), 128);
	assert!(token.chars().all(|x| x.is_ascii_alphanumeric()));
	assert_ne!(token, generate_token());

	assert_eq!(generate_file_prefix().len(), 16);
}

#[test]
fn timestamps() {
	assert_eq!(format_timestamp(0), "01.01.1970 00:00");
	assert_eq!(format_timestamp(1_700_000_000), "14.11.2023 22:13");
}

#[test]
fn page_numbers() {
	assert_eq!(Page { page: None }.number(), 0);
	assert_eq!(Page { page: Some(3) }.number(), 3);
	assert_eq!(Page { page: Some(-2) }.number(), 0);

	let last = Page { page: Some(i64::MAX) }.number();
	assert_eq!(last, i64::MAX / PAGE_SIZE - 1);
	assert!(last.checked_mul(PAGE_SIZE).is_some());
}
