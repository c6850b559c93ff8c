pub mod confirm;
pub mod input;
pub mod safety;
