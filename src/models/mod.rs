pub mod itinerary;
pub mod region;
