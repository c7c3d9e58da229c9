pub mod access;
pub mod gates;

pub use gates::{activated, permitted};
