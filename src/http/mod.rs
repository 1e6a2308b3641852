mod client;
mod request;

pub use client::{USER_AGENT, create_client};
pub use request::execute_request;
