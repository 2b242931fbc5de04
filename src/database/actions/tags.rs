use crate::{
    error::{Error, QueryError},
    schema::Tag,
};

use sqlx::{Pool, Postgres};

pub async fn list_tags(pool: &Pool<Postgres>) -> Result<Vec<Tag>, Error> {
    let list: Vec<Tag> = sqlx::query_as("SELECT * FROM tags ORDER BY id")
        .fetch_all(pool)
        .await
        .map_err(|e| QueryError::from(e).into())?;

    Ok(list)
}

pub async fn get_tag(id: i32, pool: &Pool<Postgres>) -> Result<Option<Tag>, Error> {
    let row: Option<Tag> = sqlx::query_as("SELECT * FROM tags WHERE id = $1")
        .bind(id)
        .fetch_optional(pool)
        .await
        .map_err(|e| QueryError::from(e).into())?;

    Ok(row)
}
