//! # Web API Handlers

pub mod cache;
pub mod features;
pub mod health;
pub mod root;
