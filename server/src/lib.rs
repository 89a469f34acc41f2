//! Event ticketing backend: catalog, inventory holds, settlement and sales
//! reporting over HTTP.

pub mod config;
pub mod handlers;
pub mod models;
pub mod routes;
pub mod services;
pub mod state;
pub mod store;
pub mod utils;
