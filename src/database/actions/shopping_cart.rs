use std::collections::{BTreeMap, HashSet};

use crate::{
    error::{Error, HttpError, QueryError},
    schema::{CartIngredientRow, Recipe, ShoppingCart, ShoppingListItem},
};

use super::get_recipe;

use sqlx::{Pool, Postgres};

pub async fn get_shopping_cart(
    user_id: i32,
    pool: &Pool<Postgres>,
) -> Result<Option<ShoppingCart>, Error> {
    let row: Option<ShoppingCart> =
        sqlx::query_as("SELECT * FROM shopping_carts WHERE user_id = $1")
            .bind(user_id)
            .fetch_optional(pool)
            .await
            .map_err(|e| QueryError::from(e).into())?;

    Ok(row)
}

/* carts are created on first use, not at registration */
pub async fn ensure_shopping_cart(
    user_id: i32,
    pool: &Pool<Postgres>,
) -> Result<ShoppingCart, Error> {
    sqlx::query("INSERT INTO shopping_carts (user_id) VALUES ($1) ON CONFLICT (user_id) DO NOTHING")
        .bind(user_id)
        .execute(pool)
        .await
        .map_err(|e| QueryError::from(e).into())?;

    match get_shopping_cart(user_id, pool).await? {
        Some(cart) => Ok(cart),
        None => Err(HttpError::InternalServerError.new("Failed to create shopping cart")),
    }
}

pub async fn add_to_shopping_cart(
    user_id: i32,
    recipe_id: i32,
    pool: &Pool<Postgres>,
) -> Result<Recipe, Error> {
    let recipe = match get_recipe(recipe_id, pool).await? {
        Some(recipe) => recipe,
        None => return Err(HttpError::NotFound.new("Recipe with specified id does not exist")),
    };

    let cart = ensure_shopping_cart(user_id, pool).await?;

    let rows = sqlx::query(
        "INSERT INTO shopping_cart_recipes (cart_id, recipe_id) VALUES ($1, $2) ON CONFLICT DO NOTHING",
    )
    .bind(cart.id)
    .bind(recipe_id)
    .execute(pool)
    .await
    .map_err(|e| QueryError::from(e).into())?
    .rows_affected();

    if rows <= 0 {
        return Err(HttpError::InvalidRequest.new("Recipe is already in the shopping cart"));
    }

    Ok(recipe)
}

pub async fn remove_from_shopping_cart(
    user_id: i32,
    recipe_id: i32,
    pool: &Pool<Postgres>,
) -> Result<(), Error> {
    if get_recipe(recipe_id, pool).await?.is_none() {
        return Err(HttpError::NotFound.new("Recipe with specified id does not exist"));
    }

    let cart = ensure_shopping_cart(user_id, pool).await?;

    let rows = sqlx::query("DELETE FROM shopping_cart_recipes WHERE cart_id = $1 AND recipe_id = $2")
        .bind(cart.id)
        .bind(recipe_id)
        .execute(pool)
        .await
        .map_err(|e| QueryError::from(e).into())?
        .rows_affected();

    if rows <= 0 {
        return Err(HttpError::InvalidRequest.new("Recipe is not in the shopping cart"));
    }

    Ok(())
}

pub async fn fetch_shopping_list(
    user_id: i32,
    pool: &Pool<Postgres>,
) -> Result<Vec<ShoppingListItem>, Error> {
    let cart = ensure_shopping_cart(user_id, pool).await?;

    let rows: Vec<CartIngredientRow> = sqlx::query_as(
        "
        SELECT i.name, i.measurement_unit, ia.amount FROM shopping_cart_recipes c
        INNER JOIN recipe_ingredients ri ON ri.recipe_id = c.recipe_id
        INNER JOIN ingredient_amounts ia ON ia.id = ri.amount_id
        INNER JOIN ingredients i ON i.id = ia.ingredient_id
        WHERE c.cart_id = $1
        ",
    )
    .bind(cart.id)
    .fetch_all(pool)
    .await
    .map_err(|e| QueryError::from(e).into())?;

    Ok(aggregate_shopping_list(rows))
}

/* recipes sharing an ingredient sum into one line, keyed by name and unit */
pub fn aggregate_shopping_list(rows: Vec<CartIngredientRow>) -> Vec<ShoppingListItem> {
    let mut totals: BTreeMap<(String, String), i64> = BTreeMap::new();

    for row in rows {
        *totals.entry((row.name, row.measurement_unit)).or_insert(0) += i64::from(row.amount);
    }

    totals
        .into_iter()
        .map(|((name, measurement_unit), total)| ShoppingListItem {
            name,
            measurement_unit,
            total,
        })
        .collect()
}

pub fn render_shopping_list(items: &[ShoppingListItem]) -> String {
    let mut text = String::new();

    for item in items {
        text.push_str(&format!(
            "{}{} - {}\r\n",
            item.name, item.measurement_unit, item.total
        ));
    }

    text
}

pub async fn cart_set(
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
        "
        SELECT c.recipe_id FROM shopping_cart_recipes c
        INNER JOIN shopping_carts s ON s.id = c.cart_id
        WHERE s.user_id = $1 AND c.recipe_id = ANY($2)
        ",
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

    fn row(name: &str, unit: &str, amount: i32) -> CartIngredientRow {
        CartIngredientRow {
            name: name.to_string(),
            measurement_unit: unit.to_string(),
            amount,
        }
    }

    #[test]
    fn test_amounts_of_the_same_ingredient_are_summed() {
        let items = aggregate_shopping_list(vec![row("Sugar", "g", 100), row("Sugar", "g", 50)]);

        assert_eq!(items.len(), 1);
        assert_eq!(items[0].name, "Sugar");
        assert_eq!(items[0].total, 150);
    }

    #[test]
    fn test_items_are_sorted_by_name() {
        let items = aggregate_shopping_list(vec![
            row("Salt", "g", 5),
            row("Egg", "pcs", 2),
            row("Milk", "ml", 200),
        ]);

        let names: Vec<&str> = items.iter().map(|item| item.name.as_str()).collect();

        assert_eq!(names, vec!["Egg", "Milk", "Salt"]);
    }

    #[test]
    fn test_same_name_with_different_units_stays_separate() {
        let items = aggregate_shopping_list(vec![row("Sugar", "g", 100), row("Sugar", "tbsp", 2)]);

        assert_eq!(items.len(), 2);
        assert_eq!(items[0].measurement_unit, "g");
        assert_eq!(items[1].measurement_unit, "tbsp");
    }

    #[test]
    fn test_rendered_line_format() {
        let items = aggregate_shopping_list(vec![row("Sugar", "g", 100), row("Sugar", "g", 50)]);

        assert_eq!(render_shopping_list(&items), "Sugarg - 150\r\n");
    }

    #[test]
    fn test_empty_cart_renders_to_empty_text() {
        assert_eq!(render_shopping_list(&[]), "");
    }
}
