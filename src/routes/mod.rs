pub mod activity;
pub mod groups;
pub mod health;
pub mod missions;
pub mod users;
