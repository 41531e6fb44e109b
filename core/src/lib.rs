pub mod blog;
pub mod db;
pub mod error;
pub mod models;
pub mod place;
pub mod schema;
pub mod transfer;
