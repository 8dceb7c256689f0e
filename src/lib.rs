pub mod auth;
pub mod configuration;
pub mod domain;
pub mod error;
pub mod events;
pub mod identity_client;
pub mod logger;
pub mod middleware;
pub mod response;
pub mod routes;
pub mod startup;
pub mod store;
pub mod telemetry;
pub mod validators;
