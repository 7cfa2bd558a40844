pub mod activity;
pub mod itinerary;
pub mod personality;
pub mod recommender;
