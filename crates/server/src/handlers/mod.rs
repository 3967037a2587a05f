//! HTTP request handlers

pub mod ai;
pub mod auth;
pub mod health;
pub mod platform;
pub mod resources;
pub mod settings;
