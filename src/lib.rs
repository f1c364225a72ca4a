// Library exports for Ashiato
// Integration tests build the router and services through these modules

pub mod access;
pub mod auth;
pub mod cache;
pub mod config;
pub mod db;
pub mod diary;
pub mod error;
pub mod extractors;
pub mod footprint;
pub mod routes;
pub mod state;
pub mod store;
pub mod timeline;
