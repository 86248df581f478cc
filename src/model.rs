use sqlx::{FromRow, Pool, Sqlite};
use time::OffsetDateTime;

pub const PAGE_SIZE: i64 = 20;

pub fn now() -> i64 {
    OffsetDateTime::now_utc().unix_timestamp()
}

#[derive(Debug, Clone, FromRow)]
pub struct User {
    pub id: i64,
    pub username: String,
    pub email: String,
    pub password: String,
    pub display_name: String,
    pub bio: String,
    pub avatar: Option<String>,
    pub active: bool,
    pub created: i64,
}

impl User {
    pub async fn by_username(sql: &Pool<Sqlite>, username: &str) -> Result<Option<User>, sqlx::Error> {
        sqlx::query_as::<_, User>("SELECT * FROM users WHERE username = ?")
            .bind(username)
            .fetch_optional(sql)
            .await
    }

    /// Name to show in headings; falls back to the username.
    pub fn shown_name(&self) -> &str {
        if self.display_name.is_empty() {
            &self.username
        } else {
            &self.display_name
        }
    }
}

#[derive(Debug, Clone, FromRow)]
pub struct Post {
    pub id: i64,
    pub owner: i64,
    pub caption: String,
    pub image: String,
    pub mime: String,
    pub created: i64,
}

impl Post {
    pub async fn by_id(sql: &Pool<Sqlite>, id: i64) -> Result<Option<Post>, sqlx::Error> {
        sqlx::query_as::<_, Post>("SELECT * FROM posts WHERE id = ?")
            .bind(id)
            .fetch_optional(sql)
            .await
    }
}

/// A post joined with its author and counters, as rendered in feeds.
#[derive(Debug, FromRow)]
pub struct PostView {
    pub id: i64,
    pub owner: i64,
    pub username: String,
    pub avatar: Option<String>,
    pub caption: String,
    pub image: String,
    pub created: i64,
    pub likes: i64,
    pub comments: i64,
    pub liked: bool,
}

const POST_VIEW: &str = "SELECT p.id, p.owner, u.username, u.avatar, p.caption, p.image, p.created,
        (SELECT COUNT(*) FROM likes l JOIN users lu ON lu.id = l.user
            WHERE l.post = p.id AND lu.active = 1) AS likes,
        (SELECT COUNT(*) FROM comments c JOIN users cu ON cu.id = c.author
            WHERE c.post = p.id AND cu.active = 1) AS comments,
        EXISTS (SELECT 1 FROM likes l WHERE l.post = p.id AND l.user = ?) AS liked
    FROM posts p JOIN users u ON u.id = p.owner
    WHERE u.active = 1";

/// Which posts a listing should contain.
#[derive(Debug, Clone, Copy)]
pub enum Listing {
    /// The viewer's own posts and those of everyone they follow.
    Feed(i64),
    /// Every active user's posts.
    Explore,
    /// A single user's posts.
    Profile(i64),
}

impl PostView {
    /// `viewer` decides the `liked` column; `None` never matches.
    pub async fn list(
        sql: &Pool<Sqlite>,
        listing: Listing,
        viewer: Option<i64>,
        page: i64,
    ) -> Result<Vec<PostView>, sqlx::Error> {
        let offset = page.max(0).saturating_mul(PAGE_SIZE);
        let viewer = viewer.unwrap_or(-1);

        match listing {
            Listing::Feed(user) => {
                let query = format!(
                    "{POST_VIEW} AND (p.owner = ? OR p.owner IN (SELECT followed FROM follows WHERE follower = ?))
                    ORDER BY p.created DESC, p.id DESC LIMIT ? OFFSET ?"
                );

                sqlx::query_as::<_, PostView>(&query)
                    .bind(viewer)
                    .bind(user)
                    .bind(user)
                    .bind(PAGE_SIZE)
                    .bind(offset)
                    .fetch_all(sql)
                    .await
            }
            Listing::Explore => {
                let query = format!("{POST_VIEW} ORDER BY p.created DESC, p.id DESC LIMIT ? OFFSET ?");

                sqlx::query_as::<_, PostView>(&query)
                    .bind(viewer)
                    .bind(PAGE_SIZE)
                    .bind(offset)
                    .fetch_all(sql)
                    .await
            }
            Listing::Profile(user) => {
                let query = format!(
                    "{POST_VIEW} AND p.owner = ? ORDER BY p.created DESC, p.id DESC LIMIT ? OFFSET ?"
                );

                sqlx::query_as::<_, PostView>(&query)
                    .bind(viewer)
                    .bind(user)
                    .bind(PAGE_SIZE)
                    .bind(offset)
                    .fetch_all(sql)
                    .await
            }
        }
    }

    pub async fn by_id(
        sql: &Pool<Sqlite>,
        id: i64,
        viewer: Option<i64>,
    ) -> Result<Option<PostView>, sqlx::Error> {
        let query = format!("{POST_VIEW} AND p.id = ?");

        sqlx::query_as::<_, PostView>(&query)
            .bind(viewer.unwrap_or(-1))
            .bind(id)
            .fetch_optional(sql)
            .await
    }
}

#[derive(Debug, Clone, FromRow)]
pub struct Comment {
    pub id: i64,
    pub post: i64,
    pub author: i64,
    pub body: String,
    pub created: i64,
}

#[derive(Debug, FromRow)]
pub struct CommentView {
    pub id: i64,
    pub author: i64,
    pub username: String,
    pub body: String,
    pub created: i64,
}

impl CommentView {
    pub async fn for_post(sql: &Pool<Sqlite>, post: i64) -> Result<Vec<CommentView>, sqlx::Error> {
        sqlx::query_as::<_, CommentView>(
            "SELECT c.id, c.author, u.username, c.body, c.created
            FROM comments c JOIN users u ON u.id = c.author
            WHERE c.post = ? AND u.active = 1
            ORDER BY c.created ASC, c.id ASC",
        )
        .bind(post)
        .fetch_all(sql)
        .await
    }
}

#[derive(Debug, Default, FromRow)]
pub struct ProfileStats {
    pub posts: i64,
    pub followers: i64,
    pub following: i64,
}

impl ProfileStats {
    pub async fn for_user(sql: &Pool<Sqlite>, user: i64) -> Result<ProfileStats, sqlx::Error> {
        sqlx::query_as::<_, ProfileStats>(
            "SELECT
                (SELECT COUNT(*) FROM posts WHERE owner = ?1) AS posts,
                (SELECT COUNT(*) FROM follows f JOIN users u ON u.id = f.follower
                    WHERE f.followed = ?1 AND u.active = 1) AS followers,
                (SELECT COUNT(*) FROM follows f JOIN users u ON u.id = f.followed
                    WHERE f.follower = ?1 AND u.active = 1) AS following",
        )
        .bind(user)
        .fetch_one(sql)
        .await
    }
}

pub async fn is_following(sql: &Pool<Sqlite>, follower: i64, followed: i64) -> Result<bool, sqlx::Error> {
    sqlx::query_scalar::<_, bool>(
        "SELECT EXISTS (SELECT 1 FROM follows WHERE follower = ? AND followed = ?)",
    )
    .bind(follower)
    .bind(followed)
    .fetch_one(sql)
    .await
}
