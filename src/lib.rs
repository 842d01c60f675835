//! NDR Core - a configurable data portal
//!
//! Searches are configured as a catalog of APIs, search fields and search
//! configurations. Queries are composed per backend, results are loaded over
//! HTTP (or MongoDB) and rendered through template strings.

pub mod api;
pub mod commands;
pub mod config;
pub mod db;
pub mod models;
pub mod search;
pub mod services;
pub mod template;
