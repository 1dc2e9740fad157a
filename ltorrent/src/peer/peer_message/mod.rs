pub mod message;
pub mod request;

pub use message::{Message, MessageError, MessageId};
pub use request::Request;
