use serde::Deserialize;
use sqlx::{Pool, Postgres};
use warp::{
    http::StatusCode,
    reject::Rejection,
    reply::{self, Reply},
};

use crate::{
    actions::{self, RecipeFilter},
    constants::{
        RECIPE_COUNT_PER_PAGE, SESSION_COOKIE, SHOPPING_LIST_FILENAME, USER_COUNT_PER_PAGE,
    },
    cryptography::hash_password,
    error::{Error, HttpError, TypeError},
    form::{LoginForm, RecipeForm, RegisterForm},
    jwt::SessionData,
    media::MediaStore,
    pagination::PageQuery,
    permissions::ActionType,
    schema::{RecipeShort, UserRead},
};

#[derive(Deserialize, Debug, Default)]
pub struct IngredientQuery {
    pub name: Option<String>,
}

#[derive(Debug, Default)]
pub struct RecipeListQuery {
    pub filter: RecipeFilter,
    pub page: PageQuery,
}

/* `tags` may repeat in the query string, which a serde map cannot express */
pub fn parse_recipe_query(raw: &str) -> Result<RecipeListQuery, Error> {
    let mut query = RecipeListQuery::default();

    for (key, value) in url::form_urlencoded::parse(raw.as_bytes()) {
        match key.as_ref() {
            "author" => match value.parse::<i32>() {
                Ok(author) => query.filter.author = Some(author),
                Err(_) => return Err(TypeError::new("Invalid author id").into()),
            },
            "tags" => query.filter.tags.push(value.to_string()),
            "is_favorited" => query.filter.is_favorited = parse_flag(&value),
            "is_in_shopping_cart" => query.filter.is_in_shopping_cart = parse_flag(&value),
            "limit" => query.page.limit = Some(value.to_string()),
            "offset" => query.page.offset = Some(value.to_string()),
            _ => {}
        }
    }

    Ok(query)
}

fn parse_flag(value: &str) -> bool {
    matches!(value, "1" | "true" | "True")
}

pub async fn list_tags(pool: Pool<Postgres>) -> Result<impl Reply, Rejection> {
    let list = actions::list_tags(&pool).await?;

    Ok(reply::json(&list))
}

pub async fn get_tag(id: i32, pool: Pool<Postgres>) -> Result<impl Reply, Rejection> {
    match actions::get_tag(id, &pool).await? {
        Some(tag) => Ok(reply::json(&tag)),
        None => Err(HttpError::NotFound
            .new("Tag with specified id does not exist")
            .into()),
    }
}

pub async fn search_ingredients(
    query: IngredientQuery,
    pool: Pool<Postgres>,
) -> Result<impl Reply, Rejection> {
    let name = query.name.unwrap_or_default();
    let list = actions::search_ingredients(&name, &pool).await?;

    Ok(reply::json(&list))
}

pub async fn get_ingredient(id: i32, pool: Pool<Postgres>) -> Result<impl Reply, Rejection> {
    match actions::get_ingredient(id, &pool).await? {
        Some(ingredient) => Ok(reply::json(&ingredient)),
        None => Err(HttpError::NotFound
            .new("Ingredient with specified id does not exist")
            .into()),
    }
}

pub async fn list_recipes(
    raw_query: String,
    session: Option<SessionData>,
    pool: Pool<Postgres>,
) -> Result<impl Reply, Rejection> {
    let query = parse_recipe_query(&raw_query)?;
    let viewer = session.map(|session| session.user_id);

    let page = actions::fetch_recipes(
        &query.filter,
        viewer,
        query.page.limit(RECIPE_COUNT_PER_PAGE),
        query.page.offset(),
        &pool,
    )
    .await?;

    Ok(reply::json(&page))
}

pub async fn get_recipe(
    id: i32,
    session: Option<SessionData>,
    pool: Pool<Postgres>,
) -> Result<impl Reply, Rejection> {
    let viewer = session.map(|session| session.user_id);

    match actions::get_recipe_read(id, viewer, &pool).await? {
        Some(recipe) => Ok(reply::json(&recipe)),
        None => Err(HttpError::NotFound
            .new("Recipe with specified id does not exist")
            .into()),
    }
}

pub async fn create_recipe(
    session: SessionData,
    form: RecipeForm,
    pool: Pool<Postgres>,
    media: MediaStore,
) -> Result<impl Reply, Rejection> {
    session.authenticate(ActionType::CreateRecipes)?;
    form.validate()?;

    let image_path = media.save_image(&form.image)?;
    let id = actions::create_recipe(&form, session.user_id, &image_path, &pool).await?;

    match actions::get_recipe_read(id, Some(session.user_id), &pool).await? {
        Some(recipe) => Ok(reply::with_status(
            reply::json(&recipe),
            StatusCode::CREATED,
        )),
        None => Err(HttpError::InternalServerError
            .new("Failed to load created recipe")
            .into()),
    }
}

pub async fn update_recipe(
    id: i32,
    session: SessionData,
    form: RecipeForm,
    pool: Pool<Postgres>,
    media: MediaStore,
) -> Result<impl Reply, Rejection> {
    let recipe = actions::get_recipe_mut(id, &session, &pool).await?;
    form.validate()?;

    let image_path = media.save_image(&form.image)?;
    actions::update_recipe(&recipe, &form, &image_path, &pool).await?;

    match actions::get_recipe_read(id, Some(session.user_id), &pool).await? {
        Some(recipe) => Ok(reply::json(&recipe)),
        None => Err(HttpError::InternalServerError
            .new("Failed to load updated recipe")
            .into()),
    }
}

pub async fn delete_recipe(
    id: i32,
    session: SessionData,
    pool: Pool<Postgres>,
) -> Result<impl Reply, Rejection> {
    let recipe = actions::get_recipe_mut(id, &session, &pool).await?;
    actions::delete_recipe(recipe.id, &pool).await?;

    Ok(reply::with_status(reply::reply(), StatusCode::NO_CONTENT))
}

pub async fn favorite_recipe(
    id: i32,
    session: SessionData,
    pool: Pool<Postgres>,
) -> Result<impl Reply, Rejection> {
    session.authenticate(ActionType::ManageOwnFavorites)?;

    let recipe = actions::add_to_favorites(session.user_id, id, &pool).await?;

    Ok(reply::with_status(
        reply::json(&RecipeShort::from(&recipe)),
        StatusCode::CREATED,
    ))
}

pub async fn unfavorite_recipe(
    id: i32,
    session: SessionData,
    pool: Pool<Postgres>,
) -> Result<impl Reply, Rejection> {
    session.authenticate(ActionType::ManageOwnFavorites)?;

    actions::remove_from_favorites(session.user_id, id, &pool).await?;

    Ok(reply::with_status(reply::reply(), StatusCode::NO_CONTENT))
}

pub async fn add_recipe_to_cart(
    id: i32,
    session: SessionData,
    pool: Pool<Postgres>,
) -> Result<impl Reply, Rejection> {
    session.authenticate(ActionType::ManageOwnCart)?;

    let recipe = actions::add_to_shopping_cart(session.user_id, id, &pool).await?;

    Ok(reply::with_status(
        reply::json(&RecipeShort::from(&recipe)),
        StatusCode::CREATED,
    ))
}

pub async fn remove_recipe_from_cart(
    id: i32,
    session: SessionData,
    pool: Pool<Postgres>,
) -> Result<impl Reply, Rejection> {
    session.authenticate(ActionType::ManageOwnCart)?;

    actions::remove_from_shopping_cart(session.user_id, id, &pool).await?;

    Ok(reply::with_status(reply::reply(), StatusCode::NO_CONTENT))
}

pub async fn download_shopping_list(
    session: SessionData,
    pool: Pool<Postgres>,
) -> Result<impl Reply, Rejection> {
    session.authenticate(ActionType::ManageOwnCart)?;

    let items = actions::fetch_shopping_list(session.user_id, &pool).await?;
    let body = actions::render_shopping_list(&items);

    let reply = reply::with_header(body, "content-type", "text/plain; charset=utf-8");
    let reply = reply::with_header(
        reply,
        "content-disposition",
        format!("attachment; filename={}", SHOPPING_LIST_FILENAME),
    );

    Ok(reply)
}

pub async fn register(form: RegisterForm, pool: Pool<Postgres>) -> Result<impl Reply, Rejection> {
    form.validate()?;

    let password_hash = hash_password(&form.password)?;
    let user = actions::register_user(&form, &password_hash, &pool).await?;

    Ok(reply::with_status(
        reply::json(&UserRead::from_user(&user, false)),
        StatusCode::CREATED,
    ))
}

pub async fn login(
    form: LoginForm,
    secret: String,
    pool: Pool<Postgres>,
) -> Result<impl Reply, Rejection> {
    let token = actions::login_user(&form.email, &form.password, secret.as_bytes(), &pool).await?;

    let reply = reply::json(&serde_json::json!({ "auth_token": token }));
    let reply = reply::with_header(
        reply,
        "set-cookie",
        format!("{}={}; Path=/; HttpOnly", SESSION_COOKIE, token),
    );

    Ok(reply)
}

pub async fn logout(_session: SessionData) -> Result<impl Reply, Rejection> {
    let reply = reply::with_status(reply::reply(), StatusCode::NO_CONTENT);
    let reply = reply::with_header(
        reply,
        "set-cookie",
        format!("{}=; Path=/; HttpOnly; Max-Age=0", SESSION_COOKIE),
    );

    Ok(reply)
}

pub async fn list_users(
    query: PageQuery,
    session: Option<SessionData>,
    pool: Pool<Postgres>,
) -> Result<impl Reply, Rejection> {
    let viewer = session.map(|session| session.user_id);

    let page = actions::fetch_users(
        viewer,
        query.limit(USER_COUNT_PER_PAGE),
        query.offset(),
        &pool,
    )
    .await?;

    Ok(reply::json(&page))
}

pub async fn get_user(
    id: i32,
    session: Option<SessionData>,
    pool: Pool<Postgres>,
) -> Result<impl Reply, Rejection> {
    let viewer = session.map(|session| session.user_id);

    match actions::get_user_read(id, viewer, &pool).await? {
        Some(user) => Ok(reply::json(&user)),
        None => Err(HttpError::NotFound
            .new("User with specified id does not exist")
            .into()),
    }
}

pub async fn me(session: SessionData, pool: Pool<Postgres>) -> Result<impl Reply, Rejection> {
    match actions::get_user_read(session.user_id, Some(session.user_id), &pool).await? {
        Some(user) => Ok(reply::json(&user)),
        None => Err(HttpError::NotFound
            .new("User with specified id does not exist")
            .into()),
    }
}

pub async fn list_subscriptions(
    query: PageQuery,
    session: SessionData,
    pool: Pool<Postgres>,
) -> Result<impl Reply, Rejection> {
    session.authenticate(ActionType::ManageOwnSubscriptions)?;

    let page = actions::fetch_subscriptions(
        session.user_id,
        query.limit(USER_COUNT_PER_PAGE),
        query.offset(),
        &pool,
    )
    .await?;

    Ok(reply::json(&page))
}

pub async fn subscribe(
    id: i32,
    session: SessionData,
    pool: Pool<Postgres>,
) -> Result<impl Reply, Rejection> {
    session.authenticate(ActionType::ManageOwnSubscriptions)?;

    let subscription = actions::subscribe_to_user(session.user_id, id, &pool).await?;

    Ok(reply::with_status(
        reply::json(&subscription),
        StatusCode::CREATED,
    ))
}

pub async fn unsubscribe(
    id: i32,
    session: SessionData,
    pool: Pool<Postgres>,
) -> Result<impl Reply, Rejection> {
    session.authenticate(ActionType::ManageOwnSubscriptions)?;

    actions::unsubscribe_from_user(session.user_id, id, &pool).await?;

    Ok(reply::with_status(reply::reply(), StatusCode::NO_CONTENT))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_empty_query_parses_to_defaults() {
        let query = parse_recipe_query("").unwrap();

        assert_eq!(query.filter, RecipeFilter::default());
        assert_eq!(query.page.limit(10), 10);
        assert_eq!(query.page.offset(), 0);
    }

    #[test]
    fn test_repeated_tags_are_collected() {
        let query = parse_recipe_query("tags=breakfast&tags=dinner").unwrap();

        assert_eq!(query.filter.tags, vec!["breakfast", "dinner"]);
    }

    #[test]
    fn test_percent_encoded_tags_are_decoded() {
        let query =
            parse_recipe_query("tags=%D0%B7%D0%B0%D0%B2%D1%82%D1%80%D0%B0%D0%BA").unwrap();

        assert_eq!(query.filter.tags, vec!["завтрак"]);
    }

    #[test]
    fn test_author_id_is_parsed() {
        let query = parse_recipe_query("author=7").unwrap();

        assert_eq!(query.filter.author, Some(7));
    }

    #[test]
    fn test_invalid_author_id_is_rejected() {
        let error = parse_recipe_query("author=seven").unwrap_err();

        assert_eq!(error.code, 400);
        assert_eq!(error.info.as_deref(), Some("Invalid author id"));
    }

    #[test]
    fn test_flag_spellings() {
        assert!(parse_recipe_query("is_favorited=1").unwrap().filter.is_favorited);
        assert!(parse_recipe_query("is_favorited=true").unwrap().filter.is_favorited);
        assert!(parse_recipe_query("is_favorited=True").unwrap().filter.is_favorited);
        assert!(!parse_recipe_query("is_favorited=0").unwrap().filter.is_favorited);
        assert!(!parse_recipe_query("is_favorited=false").unwrap().filter.is_favorited);
    }

    #[test]
    fn test_cart_flag_is_parsed() {
        let query = parse_recipe_query("is_in_shopping_cart=1").unwrap();

        assert!(query.filter.is_in_shopping_cart);
    }

    #[test]
    fn test_pagination_values_pass_through() {
        let query = parse_recipe_query("limit=5&offset=20").unwrap();

        assert_eq!(query.page.limit(10), 5);
        assert_eq!(query.page.offset(), 20);
    }

    #[test]
    fn test_unknown_keys_are_ignored() {
        let query = parse_recipe_query("page=3&search=soup&tags=lunch").unwrap();

        assert_eq!(query.filter.tags, vec!["lunch"]);
        assert_eq!(query.filter.author, None);
        assert_eq!(query.page.offset(), 0);
    }
}
