pub mod builder;
pub mod handler;
pub mod listener;

pub use builder::{Server, ServerBuilder};
pub use handler::ConnectionHandler;
