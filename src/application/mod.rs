pub mod activity;
pub mod error;
pub mod listings;
pub mod repos;
