//! iBlog API
//!
//! Blog backend: accounts with cookie or bearer sessions, password reset by
//! email, profile and post media, categories and posts.

pub mod account;
pub mod api;
pub mod auth;
pub mod config;
pub mod content;
pub mod context;
pub mod db;
pub mod error;
pub mod mailer;
pub mod media;
pub mod server;
pub mod uploads;

#[cfg(test)]
mod testing;
