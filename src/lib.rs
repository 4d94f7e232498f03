pub mod analysis;
pub mod config;
pub mod deriv;
pub mod error;
pub mod event;
pub mod model;
pub mod rules;
