#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SlashCommand {
    Help,
    Clear,
    Export,
    Assistants,
    /// `None` when no name followed the command.
    Assistant(Option<String>),
    Tools,
    Quit,
    Unknown(String),
}

pub const HELP_TEXT: &str = "\
Commands:
  /help              show this help
  /clear             start a new conversation
  /export            write the transcript to a temp file
  /assistants        list assistants from the directory
  /assistant <name>  select an assistant by name
  /tools             list host tools offered to the assistant
  /quit              exit";

pub fn parse_slash_command(input: &str) -> Option<SlashCommand> {
    let trimmed = input.trim();
    if !trimmed.starts_with('/') {
        return None;
    }

    let (command, rest) = match trimmed.split_once(char::is_whitespace) {
        Some((command, rest)) => (command, rest.trim()),
        None => (trimmed, ""),
    };

    let parsed = match command {
        "/help" => SlashCommand::Help,
        "/clear" => SlashCommand::Clear,
        "/export" => SlashCommand::Export,
        "/assistants" => SlashCommand::Assistants,
        "/assistant" => {
            SlashCommand::Assistant((!rest.is_empty()).then(|| rest.to_string()))
        }
        "/tools" => SlashCommand::Tools,
        "/quit" | "/exit" => SlashCommand::Quit,
        _ => SlashCommand::Unknown(command.to_string()),
    };

    Some(parsed)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn plain_text_is_not_a_command() {
        assert_eq!(parse_slash_command("hello /help"), None);
        assert_eq!(parse_slash_command(""), None);
    }

    #[test]
    fn parses_known_commands() {
        assert_eq!(parse_slash_command("/help"), Some(SlashCommand::Help));
        assert_eq!(parse_slash_command("  /clear  "), Some(SlashCommand::Clear));
        assert_eq!(parse_slash_command("/export"), Some(SlashCommand::Export));
        assert_eq!(
            parse_slash_command("/assistants"),
            Some(SlashCommand::Assistants)
        );
        assert_eq!(parse_slash_command("/tools"), Some(SlashCommand::Tools));
        assert_eq!(parse_slash_command("/exit"), Some(SlashCommand::Quit));
    }

    #[test]
    fn assistant_keeps_the_full_name_argument() {
        assert_eq!(
            parse_slash_command("/assistant  Math Tutor "),
            Some(SlashCommand::Assistant(Some("Math Tutor".to_string())))
        );
        assert_eq!(
            parse_slash_command("/assistant"),
            Some(SlashCommand::Assistant(None))
        );
    }

    #[test]
    fn unknown_command_reports_the_command_word() {
        assert_eq!(
            parse_slash_command("/frobnicate now"),
            Some(SlashCommand::Unknown("/frobnicate".to_string()))
        );
    }
}
