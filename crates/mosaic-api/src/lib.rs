pub mod auth;
pub mod error;
pub mod messages;
pub mod middleware;
pub mod posts;
pub mod uploads;
pub mod users;

mod util;
mod validate;
