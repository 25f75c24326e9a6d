//! Containers backing stateful areas

pub mod front_queue;
pub mod path_map;

pub use front_queue::FrontQueue;
pub use path_map::PathMap;
