pub mod tensor;
pub mod error;
pub mod config;
pub mod splitter;
pub mod linear;
pub mod addressing;
pub mod head;
pub mod interface;
pub mod controller;
pub mod cell;
pub mod layer;
pub mod checkpoint;

pub use error::{NtmError, Result};
