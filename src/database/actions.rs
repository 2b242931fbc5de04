pub mod ingredients;
pub mod recipes;
pub mod shopping_cart;
pub mod subscriptions;
pub mod tags;
pub mod users;

pub use ingredients::*;
pub use recipes::*;
pub use shopping_cart::*;
pub use subscriptions::*;
pub use tags::*;
pub use users::*;
