pub mod access;
pub mod booking;
pub mod lifecycle;
pub mod notes;
pub mod queries;
