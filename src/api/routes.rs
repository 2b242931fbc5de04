use std::convert::Infallible;

use serde::de::DeserializeOwned;
use sqlx::{Pool, Postgres};
use warp::{
    body::BodyDeserializeError,
    http::StatusCode,
    reject::{InvalidQuery, MethodNotAllowed, PayloadTooLarge, Rejection},
    reply::{self, Reply},
    Filter,
};

use super::handlers;
use crate::{
    error::Error,
    form::{LoginForm, RecipeForm, RegisterForm},
    media::MediaStore,
    middleware::{with_possible_session, with_session},
    pagination::PageQuery,
};

fn with_pool(
    pool: Pool<Postgres>,
) -> impl Filter<Extract = (Pool<Postgres>,), Error = Infallible> + Clone {
    warp::any().map(move || pool.clone())
}

fn with_media(
    media: MediaStore,
) -> impl Filter<Extract = (MediaStore,), Error = Infallible> + Clone {
    warp::any().map(move || media.clone())
}

fn with_secret(secret: String) -> impl Filter<Extract = (String,), Error = Infallible> + Clone {
    warp::any().map(move || secret.clone())
}

fn json_body<T: DeserializeOwned + Send>(
) -> impl Filter<Extract = (T,), Error = Rejection> + Clone {
    warp::body::content_length_limit(1024 * 1024 * 16).and(warp::body::json())
}

/* an absent query string should read as empty, not reject the request */
fn raw_query() -> impl Filter<Extract = (String,), Error = Infallible> + Clone {
    warp::query::raw().or(warp::any().map(String::new)).unify()
}

pub fn routes(
    pool: Pool<Postgres>,
    media: MediaStore,
    secret: String,
) -> impl Filter<Extract = (impl Reply,), Error = Rejection> + Clone {
    let list_tags = warp::path!("tags")
        .and(warp::get())
        .and(with_pool(pool.clone()))
        .and_then(handlers::list_tags);

    let get_tag = warp::path!("tags" / i32)
        .and(warp::get())
        .and(with_pool(pool.clone()))
        .and_then(handlers::get_tag);

    let search_ingredients = warp::path!("ingredients")
        .and(warp::get())
        .and(warp::query::<handlers::IngredientQuery>())
        .and(with_pool(pool.clone()))
        .and_then(handlers::search_ingredients);

    let get_ingredient = warp::path!("ingredients" / i32)
        .and(warp::get())
        .and(with_pool(pool.clone()))
        .and_then(handlers::get_ingredient);

    let download_shopping_list = warp::path!("recipes" / "shopping_cart" / "download")
        .and(warp::get())
        .and(with_session(secret.clone()))
        .and(with_pool(pool.clone()))
        .and_then(handlers::download_shopping_list);

    let list_recipes = warp::path!("recipes")
        .and(warp::get())
        .and(raw_query())
        .and(with_possible_session(secret.clone()))
        .and(with_pool(pool.clone()))
        .and_then(handlers::list_recipes);

    let create_recipe = warp::path!("recipes")
        .and(warp::post())
        .and(with_session(secret.clone()))
        .and(json_body::<RecipeForm>())
        .and(with_pool(pool.clone()))
        .and(with_media(media.clone()))
        .and_then(handlers::create_recipe);

    let get_recipe = warp::path!("recipes" / i32)
        .and(warp::get())
        .and(with_possible_session(secret.clone()))
        .and(with_pool(pool.clone()))
        .and_then(handlers::get_recipe);

    let update_recipe = warp::path!("recipes" / i32)
        .and(warp::put().or(warp::patch()).unify())
        .and(with_session(secret.clone()))
        .and(json_body::<RecipeForm>())
        .and(with_pool(pool.clone()))
        .and(with_media(media.clone()))
        .and_then(handlers::update_recipe);

    let delete_recipe = warp::path!("recipes" / i32)
        .and(warp::delete())
        .and(with_session(secret.clone()))
        .and(with_pool(pool.clone()))
        .and_then(handlers::delete_recipe);

    let favorite_recipe = warp::path!("recipes" / i32 / "favorite")
        .and(warp::post())
        .and(with_session(secret.clone()))
        .and(with_pool(pool.clone()))
        .and_then(handlers::favorite_recipe);

    let unfavorite_recipe = warp::path!("recipes" / i32 / "favorite")
        .and(warp::delete())
        .and(with_session(secret.clone()))
        .and(with_pool(pool.clone()))
        .and_then(handlers::unfavorite_recipe);

    let add_recipe_to_cart = warp::path!("recipes" / i32 / "shopping_cart")
        .and(warp::post())
        .and(with_session(secret.clone()))
        .and(with_pool(pool.clone()))
        .and_then(handlers::add_recipe_to_cart);

    let remove_recipe_from_cart = warp::path!("recipes" / i32 / "shopping_cart")
        .and(warp::delete())
        .and(with_session(secret.clone()))
        .and(with_pool(pool.clone()))
        .and_then(handlers::remove_recipe_from_cart);

    let register = warp::path!("users")
        .and(warp::post())
        .and(json_body::<RegisterForm>())
        .and(with_pool(pool.clone()))
        .and_then(handlers::register);

    let list_users = warp::path!("users")
        .and(warp::get())
        .and(warp::query::<PageQuery>())
        .and(with_possible_session(secret.clone()))
        .and(with_pool(pool.clone()))
        .and_then(handlers::list_users);

    let me = warp::path!("users" / "me")
        .and(warp::get())
        .and(with_session(secret.clone()))
        .and(with_pool(pool.clone()))
        .and_then(handlers::me);

    let list_subscriptions = warp::path!("users" / "subscriptions")
        .and(warp::get())
        .and(warp::query::<PageQuery>())
        .and(with_session(secret.clone()))
        .and(with_pool(pool.clone()))
        .and_then(handlers::list_subscriptions);

    let get_user = warp::path!("users" / i32)
        .and(warp::get())
        .and(with_possible_session(secret.clone()))
        .and(with_pool(pool.clone()))
        .and_then(handlers::get_user);

    let subscribe = warp::path!("users" / i32 / "subscribe")
        .and(warp::post())
        .and(with_session(secret.clone()))
        .and(with_pool(pool.clone()))
        .and_then(handlers::subscribe);

    let unsubscribe = warp::path!("users" / i32 / "subscribe")
        .and(warp::delete())
        .and(with_session(secret.clone()))
        .and(with_pool(pool.clone()))
        .and_then(handlers::unsubscribe);

    let login = warp::path!("auth" / "token" / "login")
        .and(warp::post())
        .and(json_body::<LoginForm>())
        .and(with_secret(secret.clone()))
        .and(with_pool(pool.clone()))
        .and_then(handlers::login);

    let logout = warp::path!("auth" / "token" / "logout")
        .and(warp::post())
        .and(with_session(secret))
        .and_then(handlers::logout);

    list_tags
        .or(get_tag)
        .or(search_ingredients)
        .or(get_ingredient)
        .or(download_shopping_list)
        .or(list_recipes)
        .or(create_recipe)
        .or(get_recipe)
        .or(update_recipe)
        .or(delete_recipe)
        .or(favorite_recipe)
        .or(unfavorite_recipe)
        .or(add_recipe_to_cart)
        .or(remove_recipe_from_cart)
        .or(register)
        .or(list_users)
        .or(me)
        .or(list_subscriptions)
        .or(get_user)
        .or(subscribe)
        .or(unsubscribe)
        .or(login)
        .or(logout)
}

/* applied by the server binary, after the route table is assembled */
pub async fn handle_rejection(err: Rejection) -> Result<impl Reply, Infallible> {
    let (status, message) = if let Some(error) = err.find::<Error>() {
        let status = StatusCode::from_u16(error.code).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);
        let message = error
            .info
            .clone()
            .or_else(|| status.canonical_reason().map(str::to_string))
            .unwrap_or_else(|| "Unknown error".to_string());

        (status, message)
    } else if err.is_not_found() {
        return Ok(reply::with_status(
            reply::json(&serde_json::json!({ "detail": "Not found." })),
            StatusCode::NOT_FOUND,
        ));
    } else if let Some(error) = err.find::<BodyDeserializeError>() {
        (StatusCode::BAD_REQUEST, error.to_string())
    } else if err.find::<InvalidQuery>().is_some() {
        (StatusCode::BAD_REQUEST, "Invalid query string".to_string())
    } else if err.find::<MethodNotAllowed>().is_some() {
        (
            StatusCode::METHOD_NOT_ALLOWED,
            "Method not allowed".to_string(),
        )
    } else if err.find::<PayloadTooLarge>().is_some() {
        (
            StatusCode::PAYLOAD_TOO_LARGE,
            "Payload too large".to_string(),
        )
    } else {
        log::error!("unhandled rejection: {:?}", err);
        (
            StatusCode::INTERNAL_SERVER_ERROR,
            "Internal server error".to_string(),
        )
    };

    Ok(reply::with_status(
        reply::json(&serde_json::json!({ "errors": message })),
        status,
    ))
}
