//! Route handler modules for the secret-pages REST API.

pub mod auth;
pub mod friends;
pub mod health;
pub mod pages;
pub mod websocket;
