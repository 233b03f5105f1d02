pub mod admin_lock;
pub mod catalog;
pub mod db;
pub mod dialog;
pub mod flows;
pub mod i18n;
pub mod models;
pub mod observability;
pub mod repository;
pub mod schema;
pub mod session;
pub mod update;
pub mod validation;
