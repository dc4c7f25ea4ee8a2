pub mod rest;
pub mod state;
pub mod turn_task;

// Re-export the REST handlers to make them easily accessible
// to the binary that will build the web server router.
pub use rest::{
    create_chat_handler, get_chat_handler, list_chats_handler, list_messages_handler,
    post_message_handler, update_chat_handler,
};
