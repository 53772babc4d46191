use tonpass_shared::Update;

pub const CONTINUE: &str = "continue";
pub const STOP: &str = "stop";

#[derive(Debug, Clone, PartialEq)]
pub struct Incoming {
    pub user_id: String,
    pub chat_id: i64,
    pub action: Action,
}

#[derive(Debug, Clone, PartialEq)]
pub enum Action {
    Start { full_name: String },
    Check,
    CasinoId(String),
    Continue { callback_id: String },
    Stop { callback_id: String },
}

/// Digits only, at least four of them.
pub fn is_casino_id(text: &str) -> bool {
    text.len() >= 4 && text.bytes().all(|b| b.is_ascii_digit())
}

fn command_name(text: &str) -> Option<&str> {
    let first = text.split_whitespace().next()?;
    let name = first.strip_prefix('/')?;
    Some(name.split('@').next().unwrap_or(name))
}

/// Maps a raw update onto the action it triggers. Updates no handler cares
/// about map to `None`.
pub fn route(update: &Update) -> Option<Incoming> {
    if let Some(cb) = &update.callback_query {
        let callback_id = cb.id.clone();
        let action = match cb.data.as_deref()? {
            CONTINUE => Action::Continue { callback_id },
            STOP => Action::Stop { callback_id },
            _ => return None,
        };
        let chat_id = cb.message.as_ref().map_or(cb.from.id, |m| m.chat.id);
        return Some(Incoming {
            user_id: cb.from.id.to_string(),
            chat_id,
            action,
        });
    }

    let message = update.message.as_ref()?;
    let from = message.from.as_ref()?;
    let text = message.text.as_deref()?.trim();
    let action = match command_name(text) {
        Some("start") => Action::Start {
            full_name: from.full_name(),
        },
        Some("check") => Action::Check,
        Some(_) => return None,
        None if is_casino_id(text) => Action::CasinoId(text.to_string()),
        None => return None,
    };
    Some(Incoming {
        user_id: from.id.to_string(),
        chat_id: message.chat.id,
        action,
    })
}
