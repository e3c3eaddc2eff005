//! Shared utility modules used across Phalanx components.

pub mod priority_queue;

pub use priority_queue::PriorityQueue;
