pub mod auth;
pub mod logging;
pub mod pages;
pub mod storage;
pub mod web_client;
