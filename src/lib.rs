pub mod checkin;
pub mod config;
pub mod db;
pub mod error;
pub mod jobs;
pub mod models;
pub mod push;
pub mod routes;
pub mod stats;
pub mod utils;
