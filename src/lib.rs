//! Stock Metadata Generator
//!
//! Uploads a batch of images or videos and asks Gemini for a title, keywords
//! and a category per file. Items run concurrently, API keys rotate
//! round-robin across items, and failed items can be retried in later rounds
//! without touching the ones that already succeeded.

pub mod app_state;
pub mod config;
pub mod models;
pub mod routes;
pub mod services;
