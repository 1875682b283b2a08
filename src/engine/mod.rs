pub mod assets;
pub mod bone_palette;
pub mod config;
pub mod interpolate;
pub mod pose;
pub mod track;
pub mod vertex;
