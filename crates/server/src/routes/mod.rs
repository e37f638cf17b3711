pub mod auth;
pub mod bookings;
pub mod messages;
pub mod profile;
pub mod reviews;
pub mod tutors;
