mod auth;
mod catalog;
mod health_check;
mod user;

pub use auth::{login, logout, refresh, register};
pub use catalog::{caller, caller_email};
pub use health_check::health_check;
pub use user::{delete_user, email, existence, get_current_user, get_user_summary, UserProfile};
