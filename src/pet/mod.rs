pub mod derived;
pub mod engine;
pub mod fao56;
pub mod radiation;
pub mod resolve;
pub mod vapour;
