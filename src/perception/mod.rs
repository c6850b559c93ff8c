pub mod image;
pub mod locater;
pub mod screenshot;
pub mod types;
