use std::str::FromStr;

use anyhow::{anyhow, bail};

use snaps_chat::SyncEvent;
use snaps_types::post::PostKey;

/// A line typed at the prompt.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    Event(SyncEvent),
    Select(String),
    Send(String),
    Classify(PostKey),
    Preview(PostKey),
    Avatar(String),
    Unread,
    Quit,
}

impl FromStr for Command {
    type Err = anyhow::Error;

    fn from_str(line: &str) -> Result<Self, Self::Err> {
        let line = line.trim();
        let (word, rest) = match line.split_once(char::is_whitespace) {
            Some((word, rest)) => (word, rest.trim()),
            None => (line, ""),
        };

        let command = match word {
            "open" => Self::Event(SyncEvent::ChatOpened),
            "close" => Self::Event(SyncEvent::ChatClosed),
            "fg" => Self::Event(SyncEvent::AppForegrounded),
            "bg" => Self::Event(SyncEvent::AppBackgrounded),
            "unread" => Self::Unread,
            "quit" | "exit" => Self::Quit,
            "select" | "send" | "classify" | "preview" | "avatar" if rest.is_empty() => {
                bail!("'{}' needs an argument", word)
            }
            "select" => Self::Select(rest.to_string()),
            "send" => Self::Send(rest.to_string()),
            "avatar" => Self::Avatar(rest.trim_start_matches('@').to_string()),
            "classify" => Self::Classify(post_key(rest)?),
            "preview" => Self::Preview(post_key(rest)?),
            "" => bail!("empty command"),
            other => bail!("unknown command '{}'", other),
        };
        Ok(command)
    }
}

fn post_key(raw: &str) -> anyhow::Result<PostKey> {
    PostKey::parse(raw).ok_or_else(|| anyhow!("expected <author>/<permlink>, got '{}'", raw))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_events() {
        assert_eq!("open".parse::<Command>().unwrap(), Command::Event(SyncEvent::ChatOpened));
        assert_eq!(" bg ".parse::<Command>().unwrap(), Command::Event(SyncEvent::AppBackgrounded));
    }

    #[test]
    fn keeps_message_text() {
        assert_eq!(
            "send gm   everyone".parse::<Command>().unwrap(),
            Command::Send("gm   everyone".into())
        );
    }

    #[test]
    fn parses_post_key() {
        assert_eq!(
            "classify @alice/snap-123".parse::<Command>().unwrap(),
            Command::Classify(PostKey::new("alice", "snap-123"))
        );
        assert!("classify nonsense".parse::<Command>().is_err());
        assert_eq!(
            "preview bob/trip".parse::<Command>().unwrap(),
            Command::Preview(PostKey::new("bob", "trip"))
        );
    }

    #[test]
    fn rejects_missing_arguments() {
        assert!("send".parse::<Command>().is_err());
        assert!("dance".parse::<Command>().is_err());
        assert!("".parse::<Command>().is_err());
    }
}
