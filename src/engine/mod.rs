pub mod element;
pub mod events;
pub mod region;
pub mod retry;
