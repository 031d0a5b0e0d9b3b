// Library exports for Pixboard
// This allows integration tests and external code to use Pixboard modules

pub mod auth;
pub mod config;
pub mod content;
pub mod db;
pub mod engagement;
pub mod error;
pub mod extractors;
pub mod routes;
pub mod scrape;
pub mod state;
