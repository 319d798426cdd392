pub mod auth;
pub mod engagement;
pub mod groups;
pub mod guard;
pub mod listing;
pub mod posts;
pub mod social;
pub mod users;
