use crate::{
    error::{Error, QueryError},
    schema::Ingredient,
};

use sqlx::{Pool, Postgres};

pub async fn list_ingredients(pool: &Pool<Postgres>) -> Result<Vec<Ingredient>, Error> {
    let list: Vec<Ingredient> = sqlx::query_as("SELECT * FROM ingredients ORDER BY name")
        .fetch_all(pool)
        .await
        .map_err(|e| QueryError::from(e).into())?;

    Ok(list)
}

pub async fn get_ingredient(id: i32, pool: &Pool<Postgres>) -> Result<Option<Ingredient>, Error> {
    let row: Option<Ingredient> = sqlx::query_as("SELECT * FROM ingredients WHERE id = $1")
        .bind(id)
        .fetch_optional(pool)
        .await
        .map_err(|e| QueryError::from(e).into())?;

    Ok(row)
}

pub async fn search_ingredients(
    query: &str,
    pool: &Pool<Postgres>,
) -> Result<Vec<Ingredient>, Error> {
    if query.is_empty() {
        return list_ingredients(pool).await;
    }

    let list: Vec<Ingredient> =
        sqlx::query_as("SELECT * FROM ingredients WHERE name ILIKE $1 ORDER BY name")
            .bind(like_pattern(query))
            .fetch_all(pool)
            .await
            .map_err(|e| QueryError::from(e).into())?;

    Ok(rank_ingredient_search(list, query))
}

/* % and _ are LIKE wildcards, a search query matches them literally */
fn like_pattern(query: &str) -> String {
    let escaped = query
        .replace('\\', "\\\\")
        .replace('%', "\\%")
        .replace('_', "\\_");

    format!("%{escaped}%")
}

/* names that start with the query come before names that merely contain it,
 * keeping the alphabetical order inside each group */
pub fn rank_ingredient_search(rows: Vec<Ingredient>, query: &str) -> Vec<Ingredient> {
    let query = query.to_lowercase();

    let (mut prefixed, contained): (Vec<Ingredient>, Vec<Ingredient>) = rows
        .into_iter()
        .partition(|row| row.name.to_lowercase().starts_with(&query));

    prefixed.extend(contained);
    prefixed
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ingredient(id: i32, name: &str) -> Ingredient {
        Ingredient {
            id,
            name: name.to_string(),
            measurement_unit: "г".to_string(),
        }
    }

    #[test]
    fn test_prefix_matches_rank_before_substring_matches() {
        let rows = vec![
            ingredient(1, "Рассольник"),
            ingredient(2, "Фасоль"),
            ingredient(3, "Соль"),
        ];

        let ranked = rank_ingredient_search(rows, "Сол");
        let names: Vec<&str> = ranked.iter().map(|row| row.name.as_str()).collect();

        assert_eq!(names, vec!["Соль", "Рассольник", "Фасоль"]);
    }

    #[test]
    fn test_ranking_is_case_insensitive() {
        let rows = vec![ingredient(1, "salt"), ingredient(2, "Sea salt")];

        let ranked = rank_ingredient_search(rows, "SALT");
        let names: Vec<&str> = ranked.iter().map(|row| row.name.as_str()).collect();

        assert_eq!(names, vec!["salt", "Sea salt"]);
    }

    #[test]
    fn test_ranking_preserves_order_inside_groups() {
        let rows = vec![
            ingredient(1, "Milk chocolate"),
            ingredient(2, "Milk"),
            ingredient(3, "Almond milk"),
            ingredient(4, "Coconut milk"),
        ];

        let ranked = rank_ingredient_search(rows, "milk");
        let ids: Vec<i32> = ranked.iter().map(|row| row.id).collect();

        assert_eq!(ids, vec![1, 2, 3, 4]);
    }

    #[test]
    fn test_ranking_keeps_all_rows() {
        let rows = vec![ingredient(1, "Sugar"), ingredient(2, "Brown sugar")];

        let ranked = rank_ingredient_search(rows, "sugar");

        assert_eq!(ranked.len(), 2);
    }

    #[test]
    fn test_like_pattern_escapes_wildcards() {
        assert_eq!(like_pattern("salt"), "%salt%");
        assert_eq!(like_pattern("50_%"), "%50\\_\\%%");
        assert_eq!(like_pattern("a\\b"), "%a\\\\b%");
    }
}
