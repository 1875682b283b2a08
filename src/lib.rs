//! Skeletal animation for the Rehti engine: importing rigged models, evaluating their clips every
//! tick and feeding the resulting bone palettes to the GPU.

pub mod engine;
pub mod game;
