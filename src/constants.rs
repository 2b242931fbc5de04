pub const USER_COUNT_PER_PAGE: i64 = 10;
pub const RECIPE_COUNT_PER_PAGE: i64 = 10;
pub const MAX_PAGE_SIZE: i64 = 100;

pub const MIN_COOKING_TIME: i32 = 1;
pub const MIN_INGREDIENT_AMOUNT: i32 = 1;

pub const SESSION_COOKIE: &str = "session";
pub const SESSION_LIFETIME_HOURS: i64 = 24;

pub const SHOPPING_LIST_FILENAME: &str = "shopping_list";

pub const RESERVED_USERNAMES: &[&str] = &["me"];
