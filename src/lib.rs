pub mod admin;
pub mod api;
pub mod config;
pub mod conformity;
pub mod db;
pub mod error;
pub mod rooms;
pub mod sensors;
