use std::collections::{HashMap, HashSet};

use crate::{
    error::{Error, HttpError, QueryError},
    pagination::PageContext,
    schema::{Recipe, RecipeShort, SubscriptionRead, User, UserRow},
};

use super::get_user_by_id;

use sqlx::{Pool, Postgres};

pub async fn is_subscribed(
    user_id: i32,
    author_id: i32,
    pool: &Pool<Postgres>,
) -> Result<bool, Error> {
    let row = sqlx::query("SELECT 1 FROM subscriptions WHERE user_id = $1 AND author_id = $2")
        .bind(user_id)
        .bind(author_id)
        .fetch_optional(pool)
        .await
        .map_err(|e| QueryError::from(e).into())?;

    Ok(row.is_some())
}

/* authors out of `author_ids` that the viewer is subscribed to, resolved in one query */
pub async fn subscribed_set(
    viewer: Option<i32>,
    author_ids: &[i32],
    pool: &Pool<Postgres>,
) -> Result<HashSet<i32>, Error> {
    let viewer = match viewer {
        Some(viewer) => viewer,
        None => return Ok(HashSet::new()),
    };

    if author_ids.is_empty() {
        return Ok(HashSet::new());
    }

    let rows: Vec<(i32,)> = sqlx::query_as(
        "SELECT author_id FROM subscriptions WHERE user_id = $1 AND author_id = ANY($2)",
    )
    .bind(viewer)
    .bind(author_ids)
    .fetch_all(pool)
    .await
    .map_err(|e| QueryError::from(e).into())?;

    Ok(rows.into_iter().map(|row| row.0).collect())
}

pub async fn subscribe_to_user(
    user_id: i32,
    author_id: i32,
    pool: &Pool<Postgres>,
) -> Result<SubscriptionRead, Error> {
    let author = match get_user_by_id(author_id, pool).await? {
        Some(author) => author,
        None => return Err(HttpError::InvalidRequest.new("User does not exist")),
    };

    if user_id == author_id {
        return Err(HttpError::InvalidRequest.new("You cannot subscribe to yourself"));
    }

    let rows = sqlx::query(
        "INSERT INTO subscriptions (user_id, author_id) VALUES ($1, $2) ON CONFLICT DO NOTHING",
    )
    .bind(user_id)
    .bind(author_id)
    .execute(pool)
    .await
    .map_err(|e| QueryError::from(e).into())?
    .rows_affected();

    if rows <= 0 {
        return Err(HttpError::InvalidRequest.new("You are already subscribed to this user"));
    }

    subscription_read(author, pool).await
}

pub async fn unsubscribe_from_user(
    user_id: i32,
    author_id: i32,
    pool: &Pool<Postgres>,
) -> Result<(), Error> {
    if get_user_by_id(author_id, pool).await?.is_none() {
        return Err(HttpError::InvalidRequest.new("User does not exist"));
    }

    let rows = sqlx::query("DELETE FROM subscriptions WHERE user_id = $1 AND author_id = $2")
        .bind(user_id)
        .bind(author_id)
        .execute(pool)
        .await
        .map_err(|e| QueryError::from(e).into())?
        .rows_affected();

    if rows <= 0 {
        return Err(HttpError::InvalidRequest.new("You are not subscribed to this user"));
    }

    Ok(())
}

async fn subscription_read(author: User, pool: &Pool<Postgres>) -> Result<SubscriptionRead, Error> {
    let recipes: Vec<Recipe> =
        sqlx::query_as("SELECT * FROM recipes WHERE author_id = $1 ORDER BY id DESC")
            .bind(author.id)
            .fetch_all(pool)
            .await
            .map_err(|e| QueryError::from(e).into())?;

    let recipes: Vec<RecipeShort> = recipes.iter().map(RecipeShort::from).collect();

    Ok(SubscriptionRead {
        id: author.id,
        email: author.email,
        username: author.username,
        first_name: author.first_name,
        last_name: author.last_name,
        is_subscribed: true,
        recipes_count: recipes.len() as i64,
        recipes,
    })
}

pub async fn fetch_subscriptions(
    user_id: i32,
    limit: i64,
    offset: i64,
    pool: &Pool<Postgres>,
) -> Result<PageContext<SubscriptionRead>, Error> {
    let rows: Vec<UserRow> = sqlx::query_as(
        "
        SELECT u.*, COUNT(*) OVER() AS count FROM subscriptions s
        INNER JOIN users u ON u.id = s.author_id
        WHERE s.user_id = $1
        ORDER BY u.id DESC LIMIT $2 OFFSET $3
        ",
    )
    .bind(user_id)
    .bind(limit)
    .bind(offset)
    .fetch_all(pool)
    .await
    .map_err(|e| QueryError::from(e).into())?;

    if rows.is_empty() {
        return Ok(PageContext::no_rows(limit));
    }

    let total_rows = rows.first().map(|row| row.count).unwrap_or(0);
    let authors: Vec<User> = rows.into_iter().map(User::from).collect();
    let author_ids: Vec<i32> = authors.iter().map(|author| author.id).collect();

    let recipes: Vec<Recipe> =
        sqlx::query_as("SELECT * FROM recipes WHERE author_id = ANY($1) ORDER BY id DESC")
            .bind(&author_ids)
            .fetch_all(pool)
            .await
            .map_err(|e| QueryError::from(e).into())?;

    let mut by_author: HashMap<i32, Vec<RecipeShort>> = HashMap::new();
    for recipe in recipes.iter() {
        if let Some(author_id) = recipe.author_id {
            by_author
                .entry(author_id)
                .or_default()
                .push(RecipeShort::from(recipe));
        }
    }

    let list = authors
        .into_iter()
        .map(|author| {
            let recipes = by_author.remove(&author.id).unwrap_or_default();

            SubscriptionRead {
                id: author.id,
                email: author.email,
                username: author.username,
                first_name: author.first_name,
                last_name: author.last_name,
                is_subscribed: true,
                recipes_count: recipes.len() as i64,
                recipes,
            }
        })
        .collect();

    Ok(PageContext::from_rows(list, total_rows, limit, offset))
}
