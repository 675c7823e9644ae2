//! Name resolution for the destination host

pub mod resolver;

pub use resolver::{HickoryResolver, HostResolver};
