pub mod command;
pub mod service;
pub mod telegram;

pub use command::{parse_delay_command, CommandError, DelayCommand, USAGE};
pub use service::BotService;
pub use telegram::{TelegramClient, TelegramSink, TELEGRAM_API_URL};
