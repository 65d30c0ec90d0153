pub mod booking;
pub mod directory;
pub mod ids;
pub mod profile;
pub mod slot;
pub mod suggestion;
