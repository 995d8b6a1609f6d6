use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

/// Role a registered user holds. Exactly one per user.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
pub enum Role {
    Sender,
    Receiver,
    Moderator,
}

/// A gated operation a role may be granted.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
pub enum Permission {
    GetToken,
    SendMessage,
    ViewMessages,
    FlagMessage,
}

impl Role {
    /// The fixed grant table. Nothing outside it is ever allowed.
    pub fn grants(self) -> &'static [Permission] {
        use Permission::*;
        match self {
            Role::Sender => &[GetToken, SendMessage],
            Role::Receiver => &[ViewMessages],
            Role::Moderator => &[ViewMessages, FlagMessage],
        }
    }

    /// Whether this role is granted `permission`.
    pub fn allows(self, permission: Permission) -> bool {
        self.grants().contains(&permission)
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Role::Sender => "Sender",
            Role::Receiver => "Receiver",
            Role::Moderator => "Moderator",
        };
        f.write_str(name)
    }
}

impl FromStr for Role {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "sender" => Ok(Role::Sender),
            "receiver" => Ok(Role::Receiver),
            "moderator" => Ok(Role::Moderator),
            other => Err(format!(
                "invalid role '{other}', expected Sender, Receiver or Moderator"
            )),
        }
    }
}

impl fmt::Display for Permission {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Permission::GetToken => "get_token",
            Permission::SendMessage => "send_message",
            Permission::ViewMessages => "view_messages",
            Permission::FlagMessage => "flag_message",
        };
        f.write_str(name)
    }
}
