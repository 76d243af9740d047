use thiserror::Error;

pub const USAGE: &str = "Usage: /delay <primary_video_url> <secondary_audio_url>";

/// A parsed `/delay` request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DelayCommand {
    pub primary_url: String,
    pub secondary_url: String,
}

#[derive(Error, Debug, PartialEq, Eq)]
pub enum CommandError {
    #[error("not a /delay command")]
    NotACommand,

    #[error("{}", USAGE)]
    Usage,
}

/// Parse `/delay <primary_url> <secondary_url>`, also accepting `/delay@BotName`.
pub fn parse_delay_command(text: &str) -> Result<DelayCommand, CommandError> {
    let mut parts = text.split_whitespace();

    let head = parts.next().ok_or(CommandError::NotACommand)?;
    let name = head.split('@').next().unwrap_or(head);
    if !name.eq_ignore_ascii_case("/delay") {
        return Err(CommandError::NotACommand);
    }

    let args: Vec<&str> = parts.collect();
    match args.as_slice() {
        [primary, secondary] => Ok(DelayCommand {
            primary_url: primary.to_string(),
            secondary_url: secondary.to_string(),
        }),
        _ => Err(CommandError::Usage),
    }
}
