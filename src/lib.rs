//! Fallacy annotation, appeal review and classifier retraining for debate arguments

pub mod app;
pub mod db;
pub mod model;
pub mod service;
