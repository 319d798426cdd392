pub mod engagement;
pub mod group;
pub mod page;
pub mod post;
pub mod social_graph;
pub mod user;
pub mod validation;
