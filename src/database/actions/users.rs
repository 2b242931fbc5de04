use crate::{
    cryptography::verify_password,
    error::{Error, HttpError, QueryError},
    form::RegisterForm,
    jwt::generate_jwt_session,
    pagination::PageContext,
    schema::{User, UserRead, UserRow},
};

use super::{is_subscribed, subscribed_set};

use sqlx::{Pool, Postgres};

pub async fn get_user_by_id(id: i32, pool: &Pool<Postgres>) -> Result<Option<User>, Error> {
    let row: Option<User> = sqlx::query_as("SELECT * FROM users WHERE id = $1")
        .bind(id)
        .fetch_optional(pool)
        .await
        .map_err(|e| QueryError::from(e).into())?;

    Ok(row)
}

pub async fn get_user_by_email(email: &str, pool: &Pool<Postgres>) -> Result<Option<User>, Error> {
    let row: Option<User> = sqlx::query_as("SELECT * FROM users WHERE email = $1")
        .bind(email)
        .fetch_optional(pool)
        .await
        .map_err(|e| QueryError::from(e).into())?;

    Ok(row)
}

/// Creates a user from a validated registration form. The password must already be hashed.
pub async fn register_user(
    form: &RegisterForm,
    password_hash: &str,
    pool: &Pool<Postgres>,
) -> Result<User, Error> {
    let user: Option<User> = sqlx::query_as(
        "
        INSERT INTO users (email, username, first_name, last_name, password)
        VALUES ($1, $2, $3, $4, $5)
        ON CONFLICT DO NOTHING
        RETURNING *
        ",
    )
    .bind(&form.email)
    .bind(&form.username)
    .bind(&form.first_name)
    .bind(&form.last_name)
    .bind(password_hash)
    .fetch_optional(pool)
    .await
    .map_err(|e| QueryError::from(e).into())?;

    match user {
        Some(user) => Ok(user),
        None => Err(HttpError::InvalidRequest.new("User with this email already exists")),
    }
}

pub async fn login_user(
    email: &str,
    password: &str,
    secret: &[u8],
    pool: &Pool<Postgres>,
) -> Result<String, Error> {
    let user = match get_user_by_email(email, pool).await? {
        Some(user) => user,
        None => return Err(HttpError::InvalidRequest.new("Invalid credentials")),
    };

    if user.is_blocked {
        return Err(HttpError::InvalidRequest.new("Account is blocked"));
    }

    if !verify_password(password, &user.password)? {
        return Err(HttpError::InvalidRequest.new("Invalid credentials"));
    }

    generate_jwt_session(&user, secret)
}

pub async fn fetch_users(
    viewer: Option<i32>,
    limit: i64,
    offset: i64,
    pool: &Pool<Postgres>,
) -> Result<PageContext<UserRead>, Error> {
    let rows: Vec<UserRow> = sqlx::query_as(
        "SELECT u.*, COUNT(*) OVER() AS count FROM users u ORDER BY u.id DESC LIMIT $1 OFFSET $2",
    )
    .bind(limit)
    .bind(offset)
    .fetch_all(pool)
    .await
    .map_err(|e| QueryError::from(e).into())?;

    if rows.is_empty() {
        return Ok(PageContext::no_rows(limit));
    }

    let total_rows = rows.first().map(|row| row.count).unwrap_or(0);
    let users: Vec<User> = rows.into_iter().map(User::from).collect();

    let author_ids: Vec<i32> = users.iter().map(|user| user.id).collect();
    let subscribed = subscribed_set(viewer, &author_ids, pool).await?;

    let list = users
        .iter()
        .map(|user| UserRead::from_user(user, subscribed.contains(&user.id)))
        .collect();

    Ok(PageContext::from_rows(list, total_rows, limit, offset))
}

pub async fn get_user_read(
    id: i32,
    viewer: Option<i32>,
    pool: &Pool<Postgres>,
) -> Result<Option<UserRead>, Error> {
    let user = match get_user_by_id(id, pool).await? {
        Some(user) => user,
        None => return Ok(None),
    };

    let subscribed = match viewer {
        Some(viewer) => is_subscribed(viewer, user.id, pool).await?,
        None => false,
    };

    Ok(Some(UserRead::from_user(&user, subscribed)))
}
