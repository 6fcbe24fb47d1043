pub mod errors;
pub mod events;
pub mod message;

pub use errors::{AppError, AppResult};
pub use events::StreamEvent;
pub use message::{
    trailing_message, Attachment, Chat, ChatStatus, Message, MessagePart, Role, StructuredPayload,
    Visibility, Vote,
};
