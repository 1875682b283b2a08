pub mod animation;
pub mod model;
pub mod settings;
