mod database {
    pub mod actions;
    pub mod error;
    pub mod form;
    pub mod pagination;
    pub mod schema;
}
mod authentication {
    pub mod cryptography;
    pub mod jwt;
    pub mod middleware;
    pub mod permissions;
}
mod api {
    pub mod handlers;
    pub mod routes;
}
mod constants;
mod media;

pub use api::*;
pub use authentication::*;
pub use constants::*;
pub use database::*;
pub use media::*;
