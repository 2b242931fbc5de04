use std::collections::HashSet;

use serde::Deserialize;

use super::error::{Error, HttpError};
use crate::constants::{MIN_COOKING_TIME, MIN_INGREDIENT_AMOUNT, RESERVED_USERNAMES};

#[derive(Deserialize, Debug, Clone)]
pub struct IngredientEntryForm {
    pub id: i32,
    pub amount: i32,
}

#[derive(Deserialize, Debug, Clone)]
pub struct RecipeForm {
    pub name: String,
    pub text: String,
    pub image: String,
    pub cooking_time: i32,
    pub tags: Vec<i32>,
    pub ingredients: Vec<IngredientEntryForm>,
}

impl RecipeForm {
    /* checks run in a fixed order and report the first failing one */
    pub fn validate(&self) -> Result<(), Error> {
        if self.cooking_time < MIN_COOKING_TIME {
            return Err(
                HttpError::InvalidRequest.new("Cooking time cannot be less than one minute")
            );
        }

        if self.tags.is_empty() {
            return Err(HttpError::InvalidRequest.new("Recipe must have at least one tag"));
        }

        let unique_tags: HashSet<_> = self.tags.iter().collect();
        if unique_tags.len() < self.tags.len() {
            return Err(HttpError::InvalidRequest.new("Tags cannot repeat"));
        }

        if self.ingredients.is_empty() {
            return Err(HttpError::InvalidRequest.new("Recipe must have at least one ingredient"));
        }

        for entry in &self.ingredients {
            if entry.amount < MIN_INGREDIENT_AMOUNT {
                return Err(
                    HttpError::InvalidRequest.new("Ingredient amount cannot be less than one")
                );
            }
        }

        let unique_ingredients: HashSet<_> =
            self.ingredients.iter().map(|entry| entry.id).collect();
        if unique_ingredients.len() < self.ingredients.len() {
            return Err(HttpError::InvalidRequest.new("Ingredients cannot repeat"));
        }

        Ok(())
    }
}

#[derive(Deserialize, Debug, Clone)]
pub struct RegisterForm {
    pub email: String,
    pub username: String,
    pub first_name: String,
    pub last_name: String,
    pub password: String,
}

impl RegisterForm {
    pub fn validate(&self) -> Result<(), Error> {
        if self.email.trim().is_empty() {
            return Err(HttpError::InvalidRequest.new("Email cannot be empty"));
        }

        if self.username.trim().is_empty() {
            return Err(HttpError::InvalidRequest.new("Username cannot be empty"));
        }

        if RESERVED_USERNAMES.contains(&self.username.as_str()) {
            return Err(HttpError::InvalidRequest.new("This username is reserved"));
        }

        if self.password.is_empty() {
            return Err(HttpError::InvalidRequest.new("Password cannot be empty"));
        }

        Ok(())
    }
}

#[derive(Deserialize, Debug, Clone)]
pub struct LoginForm {
    pub email: String,
    pub password: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn valid_form() -> RecipeForm {
        RecipeForm {
            name: "Pancakes".to_string(),
            text: "Mix everything and fry".to_string(),
            image: "data:image/png;base64,aGVsbG8=".to_string(),
            cooking_time: 20,
            tags: vec![1, 2],
            ingredients: vec![
                IngredientEntryForm { id: 1, amount: 100 },
                IngredientEntryForm { id: 2, amount: 2 },
            ],
        }
    }

    #[test]
    fn test_valid_form_passes() {
        assert!(valid_form().validate().is_ok());
    }

    #[test]
    fn test_rejects_zero_cooking_time() {
        let mut form = valid_form();
        form.cooking_time = 0;

        let error = form.validate().unwrap_err();
        assert_eq!(error.code, 400);
        assert_eq!(
            error.info.as_deref(),
            Some("Cooking time cannot be less than one minute")
        );
    }

    #[test]
    fn test_rejects_empty_tags() {
        let mut form = valid_form();
        form.tags.clear();

        let error = form.validate().unwrap_err();
        assert_eq!(error.info.as_deref(), Some("Recipe must have at least one tag"));
    }

    #[test]
    fn test_rejects_duplicate_tags() {
        let mut form = valid_form();
        form.tags = vec![1, 2, 1];

        let error = form.validate().unwrap_err();
        assert_eq!(error.info.as_deref(), Some("Tags cannot repeat"));
    }

    #[test]
    fn test_rejects_empty_ingredients() {
        let mut form = valid_form();
        form.ingredients.clear();

        let error = form.validate().unwrap_err();
        assert_eq!(
            error.info.as_deref(),
            Some("Recipe must have at least one ingredient")
        );
    }

    #[test]
    fn test_rejects_non_positive_amount() {
        let mut form = valid_form();
        form.ingredients[1].amount = 0;

        let error = form.validate().unwrap_err();
        assert_eq!(
            error.info.as_deref(),
            Some("Ingredient amount cannot be less than one")
        );
    }

    #[test]
    fn test_rejects_duplicate_ingredients() {
        let mut form = valid_form();
        form.ingredients = vec![
            IngredientEntryForm { id: 1, amount: 100 },
            IngredientEntryForm { id: 1, amount: 50 },
        ];

        let error = form.validate().unwrap_err();
        assert_eq!(error.info.as_deref(), Some("Ingredients cannot repeat"));
    }

    #[test]
    fn test_cooking_time_is_reported_before_tag_errors() {
        let mut form = valid_form();
        form.cooking_time = 0;
        form.tags.clear();

        let error = form.validate().unwrap_err();
        assert_eq!(
            error.info.as_deref(),
            Some("Cooking time cannot be less than one minute")
        );
    }

    #[test]
    fn test_tag_errors_are_reported_before_ingredient_errors() {
        let mut form = valid_form();
        form.tags = vec![3, 3];
        form.ingredients.clear();

        let error = form.validate().unwrap_err();
        assert_eq!(error.info.as_deref(), Some("Tags cannot repeat"));
    }

    #[test]
    fn test_amount_is_reported_before_duplicate_ingredients() {
        let mut form = valid_form();
        form.ingredients = vec![
            IngredientEntryForm { id: 1, amount: 0 },
            IngredientEntryForm { id: 1, amount: 50 },
        ];

        let error = form.validate().unwrap_err();
        assert_eq!(
            error.info.as_deref(),
            Some("Ingredient amount cannot be less than one")
        );
    }

    #[test]
    fn test_register_rejects_reserved_username() {
        let form = RegisterForm {
            email: "cook@example.com".to_string(),
            username: "me".to_string(),
            first_name: "Ann".to_string(),
            last_name: "Lee".to_string(),
            password: "hunter22".to_string(),
        };

        let error = form.validate().unwrap_err();
        assert_eq!(error.info.as_deref(), Some("This username is reserved"));
    }

    #[test]
    fn test_register_rejects_empty_email() {
        let form = RegisterForm {
            email: "  ".to_string(),
            username: "ann".to_string(),
            first_name: "Ann".to_string(),
            last_name: "Lee".to_string(),
            password: "hunter22".to_string(),
        };

        let error = form.validate().unwrap_err();
        assert_eq!(error.info.as_deref(), Some("Email cannot be empty"));
    }
}
