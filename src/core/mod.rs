pub mod chat_stream;
pub mod completion;
pub mod config;
pub mod conversation;
pub mod encoder;
pub mod markup;
pub mod message;
pub mod models;
pub mod session;
