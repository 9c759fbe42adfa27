pub mod map;
pub mod position;
pub mod resolver;
