use std::collections::{HashMap, HashSet};

use crate::{
    error::{Error, HttpError, QueryError},
    form::RecipeForm,
    jwt::SessionData,
    pagination::PageContext,
    permissions::ActionType,
    schema::{
        IngredientAmount, Recipe, RecipeIngredientRead, RecipePart, RecipeRead, RecipeRow,
        RecipeTagRow, Tag, User, UserRead,
    },
};

use super::{cart_set, get_shopping_cart, subscribed_set};

use sqlx::{Pool, Postgres, QueryBuilder, Transaction};

#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct RecipeFilter {
    pub author: Option<i32>,
    pub tags: Vec<String>,
    pub is_favorited: bool,
    pub is_in_shopping_cart: bool,
}

/* personal filters silently drop out for anonymous viewers and missing carts,
 * the rest of the filter still applies */
pub fn recipe_query(
    filter: &RecipeFilter,
    viewer: Option<i32>,
    cart_id: Option<i32>,
    limit: i64,
    offset: i64,
) -> QueryBuilder<'static, Postgres> {
    let mut query: QueryBuilder<'static, Postgres> =
        QueryBuilder::new("SELECT r.*, COUNT(*) OVER() AS count FROM recipes r WHERE TRUE");

    if let Some(author) = filter.author {
        query.push(" AND r.author_id = ").push_bind(author);
    }

    if !filter.tags.is_empty() {
        query
            .push(" AND r.id IN (SELECT m.recipe_id FROM recipe_tags_map m INNER JOIN tags t ON t.id = m.tag_id WHERE t.slug = ANY(")
            .push_bind(filter.tags.clone())
            .push("))");
    }

    if filter.is_favorited {
        if let Some(viewer) = viewer {
            query
                .push(" AND r.id IN (SELECT f.recipe_id FROM user_favorites f WHERE f.user_id = ")
                .push_bind(viewer)
                .push(")");
        }
    }

    if filter.is_in_shopping_cart {
        if let Some(cart_id) = cart_id {
            query
                .push(" AND r.id IN (SELECT c.recipe_id FROM shopping_cart_recipes c WHERE c.cart_id = ")
                .push_bind(cart_id)
                .push(")");
        }
    }

    query.push(" ORDER BY r.id DESC LIMIT ");
    query.push_bind(limit);
    query.push(" OFFSET ");
    query.push_bind(offset);

    query
}

pub async fn fetch_recipes(
    filter: &RecipeFilter,
    viewer: Option<i32>,
    limit: i64,
    offset: i64,
    pool: &Pool<Postgres>,
) -> Result<PageContext<RecipeRead>, Error> {
    let cart_id = match (filter.is_in_shopping_cart, viewer) {
        (true, Some(viewer)) => get_shopping_cart(viewer, pool).await?.map(|cart| cart.id),
        _ => None,
    };

    let mut query = recipe_query(filter, viewer, cart_id, limit, offset);

    let rows: Vec<RecipeRow> = query
        .build_query_as()
        .fetch_all(pool)
        .await
        .map_err(|e| QueryError::from(e).into())?;

    if rows.is_empty() {
        return Ok(PageContext::no_rows(limit));
    }

    let total_rows = rows.first().map(|row| row.count).unwrap_or(0);
    let recipes: Vec<Recipe> = rows.into_iter().map(Recipe::from).collect();

    let list = assemble_recipe_reads(recipes, viewer, pool).await?;

    Ok(PageContext::from_rows(list, total_rows, limit, offset))
}

/* batch version of the per-recipe joins, one query per relation for the whole page */
pub async fn assemble_recipe_reads(
    recipes: Vec<Recipe>,
    viewer: Option<i32>,
    pool: &Pool<Postgres>,
) -> Result<Vec<RecipeRead>, Error> {
    let recipe_ids: Vec<i32> = recipes.iter().map(|recipe| recipe.id).collect();
    let author_ids: Vec<i32> = recipes.iter().filter_map(|recipe| recipe.author_id).collect();

    let parts: Vec<RecipePart> = sqlx::query_as(
        "
        SELECT ri.recipe_id, i.id AS ingredient_id, i.name, i.measurement_unit, ia.amount
        FROM recipe_ingredients ri
        INNER JOIN ingredient_amounts ia ON ia.id = ri.amount_id
        INNER JOIN ingredients i ON i.id = ia.ingredient_id
        WHERE ri.recipe_id = ANY($1)
        ",
    )
    .bind(&recipe_ids)
    .fetch_all(pool)
    .await
    .map_err(|e| QueryError::from(e).into())?;

    let tag_rows: Vec<RecipeTagRow> = sqlx::query_as(
        "
        SELECT m.recipe_id, t.* FROM recipe_tags_map m
        INNER JOIN tags t ON t.id = m.tag_id
        WHERE m.recipe_id = ANY($1)
        ORDER BY t.id
        ",
    )
    .bind(&recipe_ids)
    .fetch_all(pool)
    .await
    .map_err(|e| QueryError::from(e).into())?;

    let authors: Vec<User> = sqlx::query_as("SELECT * FROM users WHERE id = ANY($1)")
        .bind(&author_ids)
        .fetch_all(pool)
        .await
        .map_err(|e| QueryError::from(e).into())?;

    let subscribed = subscribed_set(viewer, &author_ids, pool).await?;
    let favorited = favorite_set(viewer, &recipe_ids, pool).await?;
    let in_cart = cart_set(viewer, &recipe_ids, pool).await?;

    let mut ingredients: HashMap<i32, Vec<RecipeIngredientRead>> = HashMap::new();
    for part in parts {
        ingredients
            .entry(part.recipe_id)
            .or_default()
            .push(RecipeIngredientRead::from(part));
    }

    let mut tags: HashMap<i32, Vec<Tag>> = HashMap::new();
    for row in tag_rows {
        tags.entry(row.recipe_id).or_default().push(Tag::from(row));
    }

    let authors: HashMap<i32, User> = authors.into_iter().map(|user| (user.id, user)).collect();

    let list = recipes
        .into_iter()
        .map(|recipe| {
            let author = recipe
                .author_id
                .and_then(|id| authors.get(&id))
                .map(|user| UserRead::from_user(user, subscribed.contains(&user.id)));

            RecipeRead {
                id: recipe.id,
                name: recipe.name,
                text: recipe.text,
                image: recipe.image,
                cooking_time: recipe.cooking_time,
                author,
                tags: tags.remove(&recipe.id).unwrap_or_default(),
                ingredients: ingredients.remove(&recipe.id).unwrap_or_default(),
                is_favorited: favorited.contains(&recipe.id),
                is_in_shopping_cart: in_cart.contains(&recipe.id),
            }
        })
        .collect();

    Ok(list)
}

pub async fn get_recipe(id: i32, pool: &Pool<Postgres>) -> Result<Option<Recipe>, Error> {
    let row: Option<Recipe> = sqlx::query_as("SELECT * FROM recipes WHERE id = $1")
        .bind(id)
        .fetch_optional(pool)
        .await
        .map_err(|e| QueryError::from(e).into())?;

    Ok(row)
}

pub async fn get_recipe_read(
    id: i32,
    viewer: Option<i32>,
    pool: &Pool<Postgres>,
) -> Result<Option<RecipeRead>, Error> {
    let recipe = match get_recipe(id, pool).await? {
        Some(recipe) => recipe,
        None => return Ok(None),
    };

    let mut list = assemble_recipe_reads(vec![recipe], viewer, pool).await?;

    Ok(list.pop())
}

/// Resolves a recipe for editing, checking that the session is allowed to touch it.
pub async fn get_recipe_mut(
    id: i32,
    session: &SessionData,
    pool: &Pool<Postgres>,
) -> Result<Recipe, Error> {
    session.authenticate(ActionType::ManageOwnRecipes)?;

    let recipe = match get_recipe(id, pool).await? {
        Some(recipe) => recipe,
        None => return Err(HttpError::NotFound.new("Recipe with specified id does not exist")),
    };

    match session.authenticate(ActionType::ManageAllRecipes) {
        Ok(()) => Ok(recipe),
        Err(_) => {
            if recipe.author_id != Some(session.user_id) {
                Err(HttpError::Unauthorized.default())
            } else {
                Ok(recipe)
            }
        }
    }
}

pub async fn create_recipe(
    form: &RecipeForm,
    author_id: i32,
    image_path: &str,
    pool: &Pool<Postgres>,
) -> Result<i32, Error> {
    let mut tr = pool
        .begin()
        .await
        .map_err(|_| QueryError::new("Could not start transaction".to_owned()).into())?;

    let recipe: (i32,) = sqlx::query_as(
        "
        INSERT INTO recipes (name, text, image, cooking_time, author_id)
        VALUES ($1, $2, $3, $4, $5)
        RETURNING id
        ",
    )
    .bind(&form.name)
    .bind(&form.text)
    .bind(image_path)
    .bind(form.cooking_time)
    .bind(author_id)
    .fetch_one(&mut *tr)
    .await
    .map_err(|e| QueryError::from(e).into())?;

    attach_ingredients_and_tags(&mut tr, recipe.0, form).await?;

    tr.commit()
        .await
        .map_err(|_| QueryError::new("Could not commit transaction".to_owned()).into())?;

    Ok(recipe.0)
}

async fn attach_ingredients_and_tags(
    tr: &mut Transaction<'_, Postgres>,
    recipe_id: i32,
    form: &RecipeForm,
) -> Result<(), Error> {
    for entry in form.ingredients.iter() {
        let exists = sqlx::query("SELECT 1 FROM ingredients WHERE id = $1")
            .bind(entry.id)
            .fetch_optional(&mut **tr)
            .await
            .map_err(|e| QueryError::from(e).into())?;

        if exists.is_none() {
            return Err(
                HttpError::InvalidRequest.new("Ingredient with specified id does not exist")
            );
        }

        /* amounts are shared rows, reused across recipes */
        let amount: IngredientAmount = sqlx::query_as(
            "
            INSERT INTO ingredient_amounts (ingredient_id, amount)
            VALUES ($1, $2)
            ON CONFLICT (ingredient_id, amount) DO UPDATE SET amount = EXCLUDED.amount
            RETURNING *
            ",
        )
        .bind(entry.id)
        .bind(entry.amount)
        .fetch_one(&mut **tr)
        .await
        .map_err(|e| QueryError::from(e).into())?;

        sqlx::query("INSERT INTO recipe_ingredients (recipe_id, amount_id) VALUES ($1, $2)")
            .bind(recipe_id)
            .bind(amount.id)
            .execute(&mut **tr)
            .await
            .map_err(|e| QueryError::from(e).into())?;
    }

    for tag_id in form.tags.iter() {
        let exists = sqlx::query("SELECT 1 FROM tags WHERE id = $1")
            .bind(tag_id)
            .fetch_optional(&mut **tr)
            .await
            .map_err(|e| QueryError::from(e).into())?;

        if exists.is_none() {
            return Err(HttpError::InvalidRequest.new("Tag with specified id does not exist"));
        }

        sqlx::query("INSERT INTO recipe_tags_map (recipe_id, tag_id) VALUES ($1, $2)")
            .bind(recipe_id)
            .bind(tag_id)
            .execute(&mut **tr)
            .await
            .map_err(|e| QueryError::from(e).into())?;
    }

    Ok(())
}

pub async fn update_recipe(
    recipe: &Recipe,
    form: &RecipeForm,
    image_path: &str,
    pool: &Pool<Postgres>,
) -> Result<(), Error> {
    let mut tr = pool
        .begin()
        .await
        .map_err(|_| QueryError::new("Could not start transaction".to_owned()).into())?;

    sqlx::query("DELETE FROM recipe_ingredients WHERE recipe_id = $1")
        .bind(recipe.id)
        .execute(&mut *tr)
        .await
        .map_err(|e| QueryError::from(e).into())?;

    sqlx::query("DELETE FROM recipe_tags_map WHERE recipe_id = $1")
        .bind(recipe.id)
        .execute(&mut *tr)
        .await
        .map_err(|e| QueryError::from(e).into())?;

    attach_ingredients_and_tags(&mut tr, recipe.id, form).await?;

    sqlx::query(
        "UPDATE recipes SET name = $1, text = $2, image = $3, cooking_time = $4 WHERE id = $5",
    )
    .bind(&form.name)
    .bind(&form.text)
    .bind(image_path)
    .bind(form.cooking_time)
    .bind(recipe.id)
    .execute(&mut *tr)
    .await
    .map_err(|e| QueryError::from(e).into())?;

    tr.commit()
        .await
        .map_err(|_| QueryError::new("Could not commit transaction".to_owned()).into())?;

    Ok(())
}

pub async fn delete_recipe(id: i32, pool: &Pool<Postgres>) -> Result<(), Error> {
    let mut tr = pool
        .begin()
        .await
        .map_err(|_| QueryError::new("Could not start transaction".to_owned()).into())?;

    sqlx::query("DELETE FROM recipe_ingredients WHERE recipe_id = $1")
        .bind(id)
        .execute(&mut *tr)
        .await
        .map_err(|e| QueryError::from(e).into())?;

    sqlx::query("DELETE FROM recipe_tags_map WHERE recipe_id = $1")
        .bind(id)
        .execute(&mut *tr)
        .await
        .map_err(|e| QueryError::from(e).into())?;

    sqlx::query("DELETE FROM user_favorites WHERE recipe_id = $1")
        .bind(id)
        .execute(&mut *tr)
        .await
        .map_err(|e| QueryError::from(e).into())?;

    sqlx::query("DELETE FROM shopping_cart_recipes WHERE recipe_id = $1")
        .bind(id)
        .execute(&mut *tr)
        .await
        .map_err(|e| QueryError::from(e).into())?;

    sqlx::query("DELETE FROM recipes WHERE id = $1")
        .bind(id)
        .execute(&mut *tr)
        .await
        .map_err(|e| QueryError::from(e).into())?;

    tr.commit()
        .await
        .map_err(|_| QueryError::new("Could not commit transaction".to_owned()).into())?;

    Ok(())
}

pub async fn add_to_favorites(
    user_id: i32,
    recipe_id: i32,
    pool: &Pool<Postgres>,
) -> Result<Recipe, Error> {
    let recipe = match get_recipe(recipe_id, pool).await? {
        Some(recipe) => recipe,
        None => return Err(HttpError::NotFound.new("Recipe with specified id does not exist")),
    };

    let rows = sqlx::query(
        "INSERT INTO user_favorites (user_id, recipe_id) VALUES ($1, $2) ON CONFLICT DO NOTHING",
    )
    .bind(user_id)
    .bind(recipe_id)
    .execute(pool)
    .await
    .map_err(|e| QueryError::from(e).into())?
    .rows_affected();

    if rows <= 0 {
        return Err(HttpError::InvalidRequest.new("Recipe is already in favorites"));
    }

    Ok(recipe)
}

pub async fn remove_from_favorites(
    user_id: i32,
    recipe_id: i32,
    pool: &Pool<Postgres>,
) -> Result<(), Error> {
    if get_recipe(recipe_id, pool).await?.is_none() {
        return Err(HttpError::NotFound.new("Recipe with specified id does not exist"));
    }

    let rows = sqlx::query("DELETE FROM user_favorites WHERE user_id = $1 AND recipe_id = $2")
        .bind(user_id)
        .bind(recipe_id)
        .execute(pool)
        .await
        .map_err(|e| QueryError::from(e).into())?
        .rows_affected();

    if rows <= 0 {
        return Err(HttpError::InvalidRequest.new("Recipe is not in favorites"));
    }

    Ok(())
}

pub async fn favorite_set(
    viewer: Option<i32>,
    recipe_ids: &[i32],
    pool: &Pool<Postgres>,
) -> Result<HashSet<i32>, Error> {
    let viewer = match viewer {
        Some(viewer) => viewer,
        None => return Ok(HashSet::new()),
    };

    if recipe_ids.is_empty() {
        return Ok(HashSet::new());
    }

    let rows: Vec<(i32,)> = sqlx::query_as(
        "SELECT recipe_id FROM user_favorites WHERE user_id = $1 AND recipe_id = ANY($2)",
    )
    .bind(viewer)
    .bind(recipe_ids)
    .fetch_all(pool)
    .await
    .map_err(|e| QueryError::from(e).into())?;

    Ok(rows.into_iter().map(|row| row.0).collect())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_plain_query_has_no_filter_clauses() {
        let query = recipe_query(&RecipeFilter::default(), None, None, 10, 0);
        let sql = query.sql();

        assert!(!sql.contains("author_id ="));
        assert!(!sql.contains("recipe_tags_map"));
        assert!(!sql.contains("user_favorites"));
        assert!(!sql.contains("shopping_cart_recipes"));
        assert!(sql.contains("ORDER BY r.id DESC"));
    }

    #[test]
    fn test_author_filter_is_applied() {
        let filter = RecipeFilter {
            author: Some(7),
            ..Default::default()
        };

        let query = recipe_query(&filter, None, None, 10, 0);

        assert!(query.sql().contains("r.author_id ="));
    }

    #[test]
    fn test_tag_filter_matches_slugs() {
        let filter = RecipeFilter {
            tags: vec!["breakfast".to_string(), "dinner".to_string()],
            ..Default::default()
        };

        let query = recipe_query(&filter, None, None, 10, 0);

        assert!(query.sql().contains("t.slug = ANY("));
    }

    #[test]
    fn test_favorite_filter_needs_a_viewer() {
        let filter = RecipeFilter {
            is_favorited: true,
            ..Default::default()
        };

        let anonymous = recipe_query(&filter, None, None, 10, 0);
        assert!(!anonymous.sql().contains("user_favorites"));

        let viewer = recipe_query(&filter, Some(3), None, 10, 0);
        assert!(viewer.sql().contains("user_favorites"));
    }

    #[test]
    fn test_cart_filter_needs_an_existing_cart() {
        let filter = RecipeFilter {
            is_in_shopping_cart: true,
            ..Default::default()
        };

        let without_cart = recipe_query(&filter, Some(3), None, 10, 0);
        assert!(!without_cart.sql().contains("shopping_cart_recipes"));

        let with_cart = recipe_query(&filter, Some(3), Some(12), 10, 0);
        assert!(with_cart.sql().contains("shopping_cart_recipes"));
    }
}
