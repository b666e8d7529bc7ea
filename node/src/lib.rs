#[macro_use]
extern crate num_derive;

pub mod cementation;
pub mod config;
pub mod consensus;
mod node;
pub mod representatives;
pub mod stats;
pub mod utils;

pub use node::Node;
