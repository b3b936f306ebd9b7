pub mod angle_mapper;
pub mod fov;
pub mod settle;
pub mod target_composer;
pub mod targeting;
