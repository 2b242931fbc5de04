use serde::{Deserialize, Serialize};

#[derive(
    Clone, Debug, PartialEq, PartialOrd, sqlx::Type, Serialize, Eq, Ord, Hash, Deserialize,
)]
#[sqlx(type_name = "user_role", rename_all = "lowercase")]
#[serde(rename_all = "snake_case")]
pub enum UserRole {
    User,
    Admin,
}

#[derive(sqlx::FromRow, Debug, Clone, Serialize)]
pub struct User {
    pub id: i32,
    pub email: String,
    pub username: String,
    pub first_name: String,
    pub last_name: String,
    #[serde(skip_serializing)]
    pub password: String,
    pub is_blocked: bool,
    pub role: UserRole,
}

#[derive(sqlx::FromRow, Debug, Clone, Serialize)]
pub struct UserRow {
    pub id: i32,
    pub email: String,
    pub username: String,
    pub first_name: String,
    pub last_name: String,
    #[serde(skip_serializing)]
    pub password: String,
    pub is_blocked: bool,
    pub role: UserRole,

    pub count: i64,
}

impl From<UserRow> for User {
    fn from(row: UserRow) -> Self {
        Self {
            id: row.id,
            email: row.email,
            username: row.username,
            first_name: row.first_name,
            last_name: row.last_name,
            password: row.password,
            is_blocked: row.is_blocked,
            role: row.role,
        }
    }
}

#[derive(sqlx::FromRow, Debug, Clone, Serialize)]
pub struct Tag {
    pub id: i32,
    pub name: String,
    pub color: String,
    pub slug: String,
}

#[derive(sqlx::FromRow, Debug, Clone, Serialize)]
pub struct Ingredient {
    pub id: i32,
    pub name: String,
    pub measurement_unit: String,
}

#[derive(sqlx::FromRow, Debug, Clone, Serialize)]
pub struct IngredientAmount {
    pub id: i32,
    pub ingredient_id: i32,
    pub amount: i32,
}

#[derive(sqlx::FromRow, Debug, Clone, Serialize)]
pub struct Recipe {
    pub id: i32,
    pub name: String,
    pub text: String,
    pub image: String,
    pub cooking_time: i32,
    pub author_id: Option<i32>,
}

#[derive(sqlx::FromRow, Debug, Clone, Serialize)]
pub struct RecipeRow {
    pub id: i32,
    pub name: String,
    pub text: String,
    pub image: String,
    pub cooking_time: i32,
    pub author_id: Option<i32>,

    pub count: i64,
}

impl From<RecipeRow> for Recipe {
    fn from(row: RecipeRow) -> Self {
        Self {
            id: row.id,
            name: row.name,
            text: row.text,
            image: row.image,
            cooking_time: row.cooking_time,
            author_id: row.author_id,
        }
    }
}

/* one ingredient link of one recipe, joined through its shared amount row */
#[derive(sqlx::FromRow, Debug, Clone, Serialize)]
pub struct RecipePart {
    pub recipe_id: i32,
    pub ingredient_id: i32,
    pub name: String,
    pub measurement_unit: String,
    pub amount: i32,
}

#[derive(sqlx::FromRow, Debug, Clone, Serialize)]
pub struct RecipeTagRow {
    pub recipe_id: i32,
    pub id: i32,
    pub name: String,
    pub color: String,
    pub slug: String,
}

impl From<RecipeTagRow> for Tag {
    fn from(row: RecipeTagRow) -> Self {
        Self {
            id: row.id,
            name: row.name,
            color: row.color,
            slug: row.slug,
        }
    }
}

#[derive(sqlx::FromRow, Debug, Clone, Serialize)]
pub struct ShoppingCart {
    pub id: i32,
    pub user_id: i32,
}

#[derive(sqlx::FromRow, Debug, Clone, Serialize)]
pub struct CartIngredientRow {
    pub name: String,
    pub measurement_unit: String,
    pub amount: i32,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ShoppingListItem {
    pub name: String,
    pub measurement_unit: String,
    pub total: i64,
}

#[derive(Debug, Clone, Serialize)]
pub struct UserRead {
    pub id: i32,
    pub email: String,
    pub username: String,
    pub first_name: String,
    pub last_name: String,
    pub is_subscribed: bool,
}

impl UserRead {
    pub fn from_user(user: &User, is_subscribed: bool) -> Self {
        Self {
            id: user.id,
            email: user.email.clone(),
            username: user.username.clone(),
            first_name: user.first_name.clone(),
            last_name: user.last_name.clone(),
            is_subscribed,
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct RecipeIngredientRead {
    pub id: i32,
    pub name: String,
    pub measurement_unit: String,
    pub amount: i32,
}

impl From<RecipePart> for RecipeIngredientRead {
    fn from(part: RecipePart) -> Self {
        Self {
            id: part.ingredient_id,
            name: part.name,
            measurement_unit: part.measurement_unit,
            amount: part.amount,
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct RecipeRead {
    pub id: i32,
    pub name: String,
    pub text: String,
    pub image: String,
    pub cooking_time: i32,
    pub author: Option<UserRead>,
    pub tags: Vec<Tag>,
    pub ingredients: Vec<RecipeIngredientRead>,
    pub is_favorited: bool,
    pub is_in_shopping_cart: bool,
}

#[derive(Debug, Clone, Serialize)]
pub struct RecipeShort {
    pub id: i32,
    pub name: String,
    pub image: String,
    pub cooking_time: i32,
}

impl From<&Recipe> for RecipeShort {
    fn from(recipe: &Recipe) -> Self {
        Self {
            id: recipe.id,
            name: recipe.name.clone(),
            image: recipe.image.clone(),
            cooking_time: recipe.cooking_time,
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct SubscriptionRead {
    pub id: i32,
    pub email: String,
    pub username: String,
    pub first_name: String,
    pub last_name: String,
    pub is_subscribed: bool,
    pub recipes: Vec<RecipeShort>,
    pub recipes_count: i64,
}
