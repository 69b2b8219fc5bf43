pub mod events;
pub mod files;
pub mod health;
pub mod list;
pub mod upload;
