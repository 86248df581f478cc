use actix_web::{get, http::StatusCode, web, HttpRequest, HttpResponse};
use maud::{html, Markup, PreEscaped, DOCTYPE};
use sqlx::{Pool, Sqlite};

use crate::{
	auth::{self, Authenticatable, Session},
	error::AppError,
	flash,
	model::{self, CommentView, Listing, PostView, ProfileStats, User},
	util::{self, Page},
};

const BUTTON: &str = "rounded-lg m-auto block text-center bg-zinc-700 hover:bg-cyan-700 py-1 px-2 display:inline justify:center";
const INPUT: &str = "rounded-lg mb-4 bg-zinc-700 py-1 px-2 focus:outline-cyan-700 placeholder:italic text-center";

fn header(title: &str) -> Markup {
	html! {
		(DOCTYPE)
		meta charset="utf-8";
		meta name="viewport" content="width=device-width, initial-scale=1.0";
		title { (title) " · MateuGram" }
		script src="https://cdn.tailwindcss.com" {}
		script src="https://unpkg.com/feather-icons" {}
		script {
			(PreEscaped("window.onload = (event) => {
				feather.replace();
			};"))
		}
	}
}

fn messagebox(msg: &str) -> Markup {
	html! {
		div class="p-4 border-4 border-rose-500 text-rose-500 mb-4 text-center" {
			h2 {
				(msg)
			}
		}
	}
}

fn navbar(session: &Option<Session>) -> Markup {
	html! {
		div class="flex flex-row w-full p-4 gap-4 items-center" {
			a href="/" class="text-xl font-bold mr-auto" { "MateuGram" }
			a href="/explore" { i data-feather="compass" {} }
			@if let Some(session) = session {
				a href=(format!("/u/{}", session.user.username)) { (session.user.username) }
				a href="/settings" { i data-feather="settings" {} }
				form action="/users/logout" method="post" {
					button type="submit" class=(BUTTON) { i data-feather="log-out" {} }
				}
			} @else {
				a href="/login" { "login" }
				a href="/register" { "register" }
			}
		}
	}
}

fn avatar(name: &Option<String>, size: &str) -> Markup {
	let class = format!("rounded-full object-cover {size}");

	html! {
		@if let Some(name) = name {
			img class=(class) src=(format!("/uploads/{name}"));
		} @else {
			div class=(format!("{class} bg-zinc-600")) {}
		}
	}
}

fn post_card(post: &PostView, viewer: &dyn Authenticatable) -> Markup {
	html! {
		div class="bg-zinc-900 rounded-lg mb-8 w-96 m-auto" {
			div class="flex flex-row items-center gap-2 p-2" {
				(avatar(&post.avatar, "w-8 h-8"))
				a href=(format!("/u/{}", post.username)) class="font-bold" { (post.username) }
				span class="ml-auto text-sm text-zinc-400" { (util::format_timestamp(post.created)) }
			}
			a href=(format!("/p/{}", post.id)) {
				img class="w-full" src=(format!("/uploads/{}", post.image));
			}
			div class="flex flex-row items-center gap-2 p-2" {
				@if viewer.is_authenticated() {
					form action=(format!("/p/{}/like", post.id)) method="post" {
						button type="submit" {
							i data-feather="heart" class=(if post.liked { "text-rose-500" } else { "" }) {}
						}
					}
				}
				span { (post.likes) " likes" }
				a href=(format!("/p/{}", post.id)) class="ml-auto" { (post.comments) " comments" }
			}
			@if !post.caption.is_empty() {
				p class="p-2 text-left" { b { (post.username) } " " (post.caption) }
			}
		}
	}
}

fn pagination(base: &str, page: i64, count: usize) -> Markup {
	html! {
		div class="flex flex-row justify-center gap-4 mb-8" {
			@if page > 0 {
				a href=(format!("{base}?page={}", page - 1)) { "newer" }
			}
			@if count as i64 == model::PAGE_SIZE {
				a href=(format!("{base}?page={}", page + 1)) { "older" }
			}
		}
	}
}

fn layout(title: &str, session: &Option<Session>, message: Option<String>, content: Markup) -> HttpResponse {
	let body = html! {
		(header(title))
		body class="bg-zinc-800 text-[#f2f7f2]" {
			(navbar(session))
			div class="flex flex-col w-full h-full" {
				div class="m-auto text-center" {
					@if let Some(msg) = message {
						(messagebox(&msg))
					}
					(content)
				}
			}
		}
	};

	let mut builder = HttpResponse::Ok()
		.content_type(mime::TEXT_HTML_UTF_8)
		.body(body.into_string());
	flash::clear(&mut builder);
	builder
}

pub fn error_page(status: StatusCode, msg: &str) -> Markup {
	html! {
		(header(status.canonical_reason().unwrap_or("error")))
		body class="bg-zinc-800 text-[#f2f7f2]" {
			div class="flex flex-col w-screen h-screen" {
				div class="m-auto text-center" {
					h1 class="text-4xl mb-4" { (status.as_u16()) }
					(messagebox(msg))
					a href="/" { "back to MateuGram" }
				}
			}
		}
	}
}

#[get("/")]
async fn index(
	req: HttpRequest,
	session: Option<Session>,
	sql: web::Data<Pool<Sqlite>>,
	page: web::Query<Page>,
) -> Result<HttpResponse, AppError> {
	let user = match &session {
		Some(x) => x.user.clone(),
		None => return Ok(flash::to("/login")),
	};

	let page = page.number();
	let posts = PostView::list(&sql, Listing::Feed(user.id), Some(user.id), page).await?;

	let content = html! {
		form action="/posts" method="post" enctype="multipart/form-data" class="flex flex-col w-96 m-auto my-8" {
			input type="file" name="image" accept="image/png,image/jpeg,image/gif,image/webp" class="mb-4";
			textarea name="caption" placeholder="caption" class=(INPUT) {}
			button type="submit" class=(BUTTON) { i data-feather="upload" {} }
		}
		@if posts.is_empty() && page == 0 {
			p class="mb-8" { "Nothing here yet. Follow someone from " a href="/explore" class="underline" { "explore" } "." }
		}
		@for post in &posts {
			(post_card(post, &user))
		}
		(pagination("/", page, posts.len()))
	};

	Ok(layout("feed", &session, flash::take(&req), content))
}

#[get("/explore")]
async fn explore(
	req: HttpRequest,
	session: Option<Session>,
	sql: web::Data<Pool<Sqlite>>,
	page: web::Query<Page>,
) -> Result<HttpResponse, AppError> {
	let viewer = auth::viewer(&session);
	let page = page.number();
	let posts = PostView::list(&sql, Listing::Explore, viewer.identity(), page).await?;

	let content = html! {
		h1 class="text-2xl my-4" { "explore" }
		@for post in &posts {
			(post_card(post, viewer))
		}
		(pagination("/explore", page, posts.len()))
	};

	Ok(layout("explore", &session, flash::take(&req), content))
}

#[get("/login")]
async fn login(req: HttpRequest, session: Option<Session>) -> HttpResponse {
	if session.is_some() {
		return flash::to("/");
	}

	let content = html! {
		div class="mt-16" {
			h1 class="justify-center text-center" {
				"login"
			}
			form action="/users/login" method="post" class="mt-4 flex flex-col" {
				input type="text" name="username" placeholder="username" autocomplete="off" class=(INPUT);
				input type="password" name="password" placeholder="password" autocomplete="off" class=(INPUT);
				button type="submit" class=(BUTTON) {
					i class="m-auto" data-feather="log-in" {}
				}
				br;
				br;
				a href="/register" class="justify-center text-center mt-8" {
					"register instead"
				}
			}
		}
	};

	layout("login", &session, flash::take(&req), content)
}

#[get("/register")]
async fn register(req: HttpRequest, session: Option<Session>) -> HttpResponse {
	if session.is_some() {
		return flash::to("/");
	}

	let content = html! {
		div class="mt-16" {
			h1 class="justify-center text-center" {
				"register"
			}
			form action="/users/register" method="post" class="mt-4 flex flex-col" {
				input type="text" name="username" placeholder="username" autocomplete="off" class=(INPUT);
				input type="email" name="email" placeholder="email" autocomplete="off" class=(INPUT);
				input type="password" name="password" placeholder="password" autocomplete="off" class=(INPUT);
				button type="submit" class=(BUTTON) {
					i class="m-auto" data-feather="user-plus" {}
				}
			}
		}
	};

	layout("register", &session, flash::take(&req), content)
}

#[get("/u/{username}")]
async fn profile(
	req: HttpRequest,
	session: Option<Session>,
	sql: web::Data<Pool<Sqlite>>,
	username: web::Path<String>,
	page: web::Query<Page>,
) -> Result<HttpResponse, AppError> {
	let user: User = match User::by_username(&sql, &username).await? {
		Some(x) if x.is_active() => x,
		_ => return Err(AppError::NotFound(format!("no user named {username}"))),
	};

	let viewer = auth::viewer(&session);
	let page = page.number();
	let stats = ProfileStats::for_user(&sql, user.id).await?;
	let posts = PostView::list(&sql, Listing::Profile(user.id), viewer.identity(), page).await?;

	let following = match viewer.identity() {
		Some(id) if id != user.id => Some(model::is_following(&sql, id, user.id).await?),
		_ => None,
	};

	let content = html! {
		div class="flex flex-row items-center gap-8 w-96 m-auto my-8" {
			(avatar(&user.avatar, "w-24 h-24"))
			div class="text-left" {
				h1 class="text-2xl" { (user.shown_name()) }
				p class="text-zinc-400" { "@" (user.username) }
				p { (stats.posts) " posts · " (stats.followers) " followers · " (stats.following) " following" }
				@if !user.bio.is_empty() {
					p class="mt-2" { (user.bio) }
				}
			}
		}
		@if let Some(following) = following {
			@let action = if following { "unfollow" } else { "follow" };
			form action=(format!("/u/{}/{action}", user.username)) method="post" class="mb-8" {
				button type="submit" class=(BUTTON) { (action) }
			}
		}
		@for post in &posts {
			(post_card(post, viewer))
		}
		(pagination(&format!("/u/{}", user.username), page, posts.len()))
	};

	Ok(layout(&user.username, &session, flash::take(&req), content))
}

#[get("/p/{id}")]
async fn post_page(
	req: HttpRequest,
	session: Option<Session>,
	sql: web::Data<Pool<Sqlite>>,
	id: web::Path<i64>,
) -> Result<HttpResponse, AppError> {
	let viewer = auth::viewer(&session);

	let post = match PostView::by_id(&sql, *id, viewer.identity()).await? {
		Some(x) => x,
		None => return Err(AppError::NotFound("no such post".into())),
	};

	let comments = CommentView::for_post(&sql, post.id).await?;

	let content = html! {
		div class="my-8" {
			(post_card(&post, viewer))
		}
		@if auth::can_modify(viewer, post.owner) {
			form action=(format!("/p/{}/delete", post.id)) method="post" class="mb-8" {
				button type="submit" class=(BUTTON) { i data-feather="trash-2" {} }
			}
		}
		div class="w-96 m-auto text-left" {
			@for comment in &comments {
				div class="flex flex-row gap-2 mb-2" {
					a href=(format!("/u/{}", comment.username)) class="font-bold" { (comment.username) }
					span { (comment.body) }
					span class="ml-auto text-sm text-zinc-400" { (util::format_timestamp(comment.created)) }
					@if auth::can_modify(viewer, comment.author) || auth::can_modify(viewer, post.owner) {
						form action=(format!("/comments/{}/delete", comment.id)) method="post" {
							button type="submit" { i data-feather="x" {} }
						}
					}
				}
			}
			@if viewer.is_authenticated() {
				form action=(format!("/p/{}/comments", post.id)) method="post" class="flex flex-col mt-4" {
					input type="text" name="body" placeholder="add a comment" autocomplete="off" class=(INPUT);
					button type="submit" class=(BUTTON) { i data-feather="send" {} }
				}
			}
		}
	};

	Ok(layout("post", &session, flash::take(&req), content))
}

#[get("/settings")]
async fn settings(req: HttpRequest, session: Session) -> HttpResponse {
	let user = session.user.clone();

	let content = html! {
		div class="w-96 m-auto my-8 flex flex-col gap-8" {
			form action="/users/settings" method="post" class="flex flex-col" {
				h2 class="mb-2" { "profile" }
				input type="text" name="display_name" placeholder="display name" value=(user.display_name) class=(INPUT);
				textarea name="bio" placeholder="bio" class=(INPUT) { (user.bio) }
				button type="submit" class=(BUTTON) { "save" }
			}
			form action="/users/avatar" method="post" enctype="multipart/form-data" class="flex flex-col" {
				h2 class="mb-2" { "avatar" }
				(avatar(&user.avatar, "w-24 h-24 m-auto mb-4"))
				input type="file" name="avatar" accept="image/png,image/jpeg,image/gif,image/webp" class="mb-4";
				button type="submit" class=(BUTTON) { "upload" }
			}
			form action="/users/password" method="post" class="flex flex-col" {
				h2 class="mb-2" { "password" }
				input type="password" name="current" placeholder="current password" autocomplete="off" class=(INPUT);
				input type="password" name="new" placeholder="new password" autocomplete="off" class=(INPUT);
				button type="submit" class=(BUTTON) { "change" }
			}
			form action="/users/deactivate" method="post" class="flex flex-col" {
				h2 class="mb-2 text-rose-500" { "deactivate account" }
				input type="password" name="password" placeholder="password" autocomplete="off" class=(INPUT);
				button type="submit" class=(BUTTON) { "deactivate" }
			}
		}
	};

	let session = Some(session);
	layout("settings", &session, flash::take(&req), content)
}

pub fn configure(cfg: &mut web::ServiceConfig) {
	cfg.service(index)
		.service(explore)
		.service(login)
		.service(register)
		.service(profile)
		.service(post_page)
		.service(settings);
}
