pub mod check;
pub mod erase;
pub mod erase_all;
pub mod info;
pub mod list;
pub mod verify_geometry;
pub mod write;
