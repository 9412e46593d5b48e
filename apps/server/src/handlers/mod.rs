pub mod admin;
pub mod barber;
pub mod client;
pub mod health;
