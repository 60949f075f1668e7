pub mod collaborators;
pub mod duration;
pub mod effect;
pub mod listing;
pub mod model;
pub mod power;
pub mod resolver;

#[cfg(test)]
pub(crate) mod fixtures;
