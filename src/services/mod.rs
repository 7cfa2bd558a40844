pub mod activities;
pub mod cache;
pub mod itineraries;
pub mod metrics;
pub mod personalities;
pub mod recommendations;
pub mod recommender;
pub mod storage;
