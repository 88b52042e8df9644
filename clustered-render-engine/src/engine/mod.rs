pub mod camera;
pub mod cluster;
pub mod compute;
pub mod core;
pub mod lights;
pub mod loading;
pub mod render;
pub mod scene;
pub mod systems;
