pub mod app;
pub mod chat_loop;
pub mod renderer;
