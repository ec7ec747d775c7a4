//! Operator console command parsing.
//!
//! One command per line. The first word names the command; channel names
//! follow, and the rest of the line is taken verbatim where a command
//! takes free text (topics, mode sequences).
//!
//! ```text
//! join #help
//! mode #help +Pnt
//! mode #ops +k hunter2
//! topic #help Ask your questions here
//! part #help
//! show #help
//! list | flush | rehash | alerts | help | quit
//! ```

/// A parsed console command.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    /// Add one member to a channel, creating it if needed.
    Join {
        /// Channel name.
        channel: String,
    },
    /// Remove one member from a channel.
    Part {
        /// Channel name.
        channel: String,
    },
    /// Set a channel topic.
    Topic {
        /// Channel name.
        channel: String,
        /// New topic text; may be empty.
        text: String,
    },
    /// Apply a mode sequence to a channel.
    Mode {
        /// Channel name.
        channel: String,
        /// Mode letters and parameters, e.g. `+k-s hunter2`.
        sequence: String,
    },
    /// Print one channel as JSON.
    Show {
        /// Channel name.
        channel: String,
    },
    /// List all channels.
    List,
    /// Write the snapshot now, dirty or not.
    Flush,
    /// Reload the configuration file.
    Rehash,
    /// Print operator alerts.
    Alerts,
    /// Print the command summary.
    Help,
    /// Shut down.
    Quit,
}

/// Errors that can occur when parsing a console line.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ConsoleError {
    /// The line held no command.
    #[error("empty command")]
    Empty,

    /// The first word is not a known command.
    #[error("unknown command: {command} (try 'help')")]
    Unknown {
        /// The word that was given.
        command: String,
    },

    /// A required argument is missing.
    #[error("{command}: missing {argument}")]
    MissingArgument {
        /// The command name.
        command: &'static str,
        /// What was expected.
        argument: &'static str,
    },
}

/// Command summary printed by `help`.
pub const HELP: &str = "\
join <chan>             add a member, creating the channel
part <chan>             remove a member
topic <chan> [text]     set the topic
mode <chan> <modes>     apply a mode sequence, e.g. +Pk-s key
show <chan>             print a channel as JSON
list                    list channels
flush                   write the snapshot now
rehash                  reload the configuration
alerts                  print operator alerts
quit                    shut down";

impl Command {
    /// Parse one console line.
    ///
    /// # Errors
    ///
    /// Returns a [`ConsoleError`] for an empty line, an unknown command, or
    /// a missing argument.
    pub fn parse(line: &str) -> Result<Self, ConsoleError> {
        let line = line.trim();
        let (word, rest) = split_word(line);
        if word.is_empty() {
            return Err(ConsoleError::Empty);
        }

        match word.to_ascii_lowercase().as_str() {
            "join" => Ok(Self::Join {
                channel: channel_arg("join", rest)?.0,
            }),
            "part" => Ok(Self::Part {
                channel: channel_arg("part", rest)?.0,
            }),
            "show" => Ok(Self::Show {
                channel: channel_arg("show", rest)?.0,
            }),
            "topic" => {
                let (channel, text) = channel_arg("topic", rest)?;
                Ok(Self::Topic {
                    channel,
                    text: text.to_owned(),
                })
            }
            "mode" => {
                let (channel, sequence) = channel_arg("mode", rest)?;
                if sequence.is_empty() {
                    return Err(ConsoleError::MissingArgument {
                        command: "mode",
                        argument: "mode sequence",
                    });
                }
                Ok(Self::Mode {
                    channel,
                    sequence: sequence.to_owned(),
                })
            }
            "list" => Ok(Self::List),
            "flush" => Ok(Self::Flush),
            "rehash" => Ok(Self::Rehash),
            "alerts" => Ok(Self::Alerts),
            "help" | "?" => Ok(Self::Help),
            "quit" | "exit" => Ok(Self::Quit),
            _ => Err(ConsoleError::Unknown {
                command: word.to_owned(),
            }),
        }
    }
}

/// Split off the first whitespace-delimited word.
fn split_word(s: &str) -> (&str, &str) {
    match s.split_once(char::is_whitespace) {
        Some((word, rest)) => (word, rest.trim_start()),
        None => (s, ""),
    }
}

/// Take a required channel name, returning it and the remainder.
fn channel_arg<'a>(
    command: &'static str,
    rest: &'a str,
) -> Result<(String, &'a str), ConsoleError> {
    let (channel, rest) = split_word(rest);
    if channel.is_empty() {
        return Err(ConsoleError::MissingArgument {
            command,
            argument: "channel",
        });
    }
    Ok((channel.to_owned(), rest))
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn parses_channel_commands() {
        assert_eq!(
            Command::parse("join #help").unwrap(),
            Command::Join {
                channel: "#help".to_owned()
            }
        );
        assert_eq!(
            Command::parse("  PART   #help  ").unwrap(),
            Command::Part {
                channel: "#help".to_owned()
            }
        );
    }

    #[test]
    fn topic_keeps_rest_of_line() {
        assert_eq!(
            Command::parse("topic #help Ask  your \"questions\" here").unwrap(),
            Command::Topic {
                channel: "#help".to_owned(),
                text: "Ask  your \"questions\" here".to_owned(),
            }
        );
        assert_eq!(
            Command::parse("topic #help").unwrap(),
            Command::Topic {
                channel: "#help".to_owned(),
                text: String::new(),
            }
        );
    }

    #[test]
    fn mode_requires_a_sequence() {
        assert_eq!(
            Command::parse("mode #ops +k-s hunter2").unwrap(),
            Command::Mode {
                channel: "#ops".to_owned(),
                sequence: "+k-s hunter2".to_owned(),
            }
        );
        assert_eq!(
            Command::parse("mode #ops"),
            Err(ConsoleError::MissingArgument {
                command: "mode",
                argument: "mode sequence",
            })
        );
    }

    #[test]
    fn bare_commands() {
        assert_eq!(Command::parse("list").unwrap(), Command::List);
        assert_eq!(Command::parse("flush").unwrap(), Command::Flush);
        assert_eq!(Command::parse("rehash").unwrap(), Command::Rehash);
        assert_eq!(Command::parse("alerts").unwrap(), Command::Alerts);
        assert_eq!(Command::parse("?").unwrap(), Command::Help);
        assert_eq!(Command::parse("exit").unwrap(), Command::Quit);
    }

    #[test]
    fn rejects_bad_lines() {
        assert_eq!(Command::parse("   "), Err(ConsoleError::Empty));
        assert_eq!(
            Command::parse("kick #help bob"),
            Err(ConsoleError::Unknown {
                command: "kick".to_owned()
            })
        );
        assert_eq!(
            Command::parse("join"),
            Err(ConsoleError::MissingArgument {
                command: "join",
                argument: "channel",
            })
        );
    }
}
