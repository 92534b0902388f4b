//! API handlers

pub mod ai;
pub mod analytics;
pub mod cron;
pub mod drafts;
pub mod health;
pub mod integrations;
pub mod scheduled;
pub mod usage;
