use kbk_bot::dialog::DialogState;
use std::sync::Arc;
use teloxide::dispatching::dialogue::InMemStorage;
use teloxide::dispatching::{Dispatcher, UpdateFilterExt};
use teloxide::dptree;
use teloxide::prelude::*;
use teloxide::types::{CallbackQuery, Message};

mod gate;
mod handlers;
mod render;
mod types;

pub use types::App;

use handlers::{
    callback_handler, chat_member_handler, command_handler, inline_handler, message_handler,
    Command,
};

pub async fn run_bot(token: String, app: Arc<App>) {
    tracing::info!("Starting KBK bot...");

    let bot = Bot::new(token);

    let handler = dptree::entry()
        .chain(dptree::filter_async(gate::admin_gate))
        .branch(
            Update::filter_message()
                .enter_dialogue::<Message, InMemStorage<DialogState>, DialogState>()
                .branch(
                    dptree::entry()
                        .filter_command::<Command>()
                        .endpoint(command_handler),
                )
                .branch(dptree::endpoint(message_handler)),
        )
        .branch(
            Update::filter_callback_query()
                .enter_dialogue::<CallbackQuery, InMemStorage<DialogState>, DialogState>()
                .endpoint(callback_handler),
        )
        .branch(Update::filter_inline_query().endpoint(inline_handler))
        .branch(Update::filter_my_chat_member().endpoint(chat_member_handler));

    Dispatcher::builder(bot, handler)
        .dependencies(dptree::deps![app, InMemStorage::<DialogState>::new()])
        .default_handler(|_| async {})
        .error_handler(LoggingErrorHandler::with_custom_text(
            "An error has occurred in the dispatcher",
        ))
        .enable_ctrlc_handler()
        .build()
        .dispatch()
        .await;

    tracing::info!("Closing bot... Goodbye!");
}
