use skytorch_remote::{ConversationId, StatusAction};
use snafu::{ResultExt, Snafu};

use crate::chat::{CancelReason, Intent};

pub const HELP: &str = "\
/new               start a new chat
/open <id>         open a chat
/more              load more chats
/refresh           reload the chat list
/archive /report /remove
                   act on the open chat
/delete <id>       delete a listed chat
/confirm /cancel /esc
                   answer the open dialog
/home              back to the dashboard
/ok                dismiss an alert
/quit              exit
anything else is sent as a message";

/// One terminal line, interpreted.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    Intent(Intent),
    Help,
    Quit,
}

#[derive(Debug, Snafu)]
#[snafu(visibility(pub(crate)))]
pub enum CommandError {
    #[snafu(display("unknown command `{name}`, try /help"))]
    Unknown { stage: &'static str, name: String },
    #[snafu(display("`{name}` needs a chat id"))]
    MissingId { stage: &'static str, name: String },
    #[snafu(display("invalid chat id on `{stage}`: {source}"))]
    BadId {
        stage: &'static str,
        source: skytorch_remote::RemoteError,
    },
}

pub fn parse_command(line: &str) -> Result<Option<Command>, CommandError> {
    let line = line.trim();
    if line.is_empty() {
        return Ok(None);
    }
    if !line.starts_with('/') {
        return Ok(Some(Command::Intent(Intent::Send(line.to_string()))));
    }

    let (name, rest) = line
        .split_once(char::is_whitespace)
        .map(|(name, rest)| (name, rest.trim()))
        .unwrap_or((line, ""));

    let intent = match name {
        "/help" => return Ok(Some(Command::Help)),
        "/quit" | "/exit" => return Ok(Some(Command::Quit)),
        "/new" => Intent::NewChat,
        "/open" => Intent::SelectChat(chat_id(name, rest)?),
        "/more" => Intent::LoadMore,
        "/refresh" => Intent::RefreshList,
        "/archive" => Intent::RequestAction(StatusAction::Archive),
        "/report" => Intent::RequestAction(StatusAction::Report),
        "/remove" => Intent::RequestAction(StatusAction::Delete),
        "/delete" => Intent::RequestDelete(chat_id(name, rest)?),
        "/confirm" => Intent::Confirm,
        "/cancel" => Intent::Cancel(CancelReason::CancelControl),
        "/esc" => Intent::Cancel(CancelReason::Escape),
        "/home" => Intent::ReturnToDashboard,
        "/ok" => Intent::DismissAlert,
        _ => {
            return UnknownSnafu {
                stage: "parse-command",
                name,
            }
            .fail();
        }
    };

    Ok(Some(Command::Intent(intent)))
}

fn chat_id(name: &str, raw: &str) -> Result<ConversationId, CommandError> {
    if raw.is_empty() {
        return MissingIdSnafu {
            stage: "parse-command-argument",
            name,
        }
        .fail();
    }
    ConversationId::parse(raw).context(BadIdSnafu {
        stage: "parse-command-argument",
    })
}
