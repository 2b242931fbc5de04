use crate::{jwt::SessionData, schema::UserRole};

const ACTION_TABLE: &[(UserRole, &[ActionType])] = &[
    (
        UserRole::User,
        &[
            ActionType::CreateRecipes,
            ActionType::ManageOwnRecipes,
            ActionType::ManageOwnFavorites,
            ActionType::ManageOwnCart,
            ActionType::ManageOwnSubscriptions,
        ],
    ),
    (
        UserRole::Admin,
        &[
            ActionType::CreateRecipes,
            ActionType::ManageOwnRecipes,
            ActionType::ManageOwnFavorites,
            ActionType::ManageOwnCart,
            ActionType::ManageOwnSubscriptions,
            ActionType::ManageAllRecipes,
        ],
    ),
];

#[derive(Hash, PartialEq, Eq, PartialOrd, Ord)]
pub enum ActionType {
    CreateRecipes,

    ManageOwnRecipes,
    ManageOwnFavorites,
    ManageOwnCart,
    ManageOwnSubscriptions,

    ManageAllRecipes,
}

impl ActionType {
    pub fn authenticate(self, session: &SessionData) -> bool {
        let role = &session.role;

        ACTION_TABLE
            .iter()
            .find_map(|(table_role, actions)| {
                if role != table_role {
                    return None;
                }

                Some(actions.contains(&self))
            })
            .unwrap_or(false)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn session(role: UserRole) -> SessionData {
        SessionData {
            user_id: 1,
            username: "cook".to_string(),
            is_admin: role == UserRole::Admin,
            role,
        }
    }

    #[test]
    fn test_user_can_manage_own_content() {
        let session = session(UserRole::User);

        assert!(ActionType::CreateRecipes.authenticate(&session));
        assert!(ActionType::ManageOwnRecipes.authenticate(&session));
        assert!(ActionType::ManageOwnFavorites.authenticate(&session));
        assert!(ActionType::ManageOwnCart.authenticate(&session));
        assert!(ActionType::ManageOwnSubscriptions.authenticate(&session));
    }

    #[test]
    fn test_user_cannot_manage_all_recipes() {
        assert!(!ActionType::ManageAllRecipes.authenticate(&session(UserRole::User)));
    }

    #[test]
    fn test_admin_can_manage_all_recipes() {
        assert!(ActionType::ManageAllRecipes.authenticate(&session(UserRole::Admin)));
    }

    #[test]
    fn test_authenticate_surfaces_permission_error() {
        let error = session(UserRole::User)
            .authenticate(ActionType::ManageAllRecipes)
            .unwrap_err();

        assert_eq!(error.code, 403);
    }
}
