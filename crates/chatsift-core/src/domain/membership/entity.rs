//! Peer and membership types

use serde::{Deserialize, Serialize};

/// A tracked user identity
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, sqlx::FromRow)]
pub struct Peer {
    pub id: i64,
    pub full_name: String,
    pub username: String,
}

/// A user as seen on an incoming event
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct PeerProfile {
    pub id: i64,
    pub first_name: String,
    #[serde(default)]
    pub last_name: Option<String>,
    #[serde(default)]
    pub username: Option<String>,
}

impl PeerProfile {
    pub fn new(id: i64, first_name: impl Into<String>) -> Self {
        Self {
            id,
            first_name: first_name.into(),
            ..Default::default()
        }
    }

    pub fn with_last_name(mut self, last_name: impl Into<String>) -> Self {
        self.last_name = Some(last_name.into());
        self
    }

    pub fn with_username(mut self, username: impl Into<String>) -> Self {
        self.username = Some(username.into());
        self
    }

    /// "First Last", trimmed when either part is missing
    pub fn full_name(&self) -> String {
        format!(
            "{} {}",
            self.first_name,
            self.last_name.as_deref().unwrap_or_default()
        )
        .trim()
        .to_string()
    }

    pub fn username(&self) -> &str {
        self.username.as_deref().unwrap_or_default()
    }
}

/// Participation status reported by membership-change events
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MemberStatus {
    Creator,
    Administrator,
    Member,
    Restricted,
    Left,
    Kicked,
}

impl MemberStatus {
    pub fn is_admin(&self) -> bool {
        matches!(self, Self::Creator | Self::Administrator)
    }

    pub fn is_member(&self) -> bool {
        matches!(self, Self::Member) || self.is_admin()
    }

    pub fn is_not_member(&self) -> bool {
        matches!(self, Self::Left | Self::Kicked)
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Creator => "creator",
            Self::Administrator => "administrator",
            Self::Member => "member",
            Self::Restricted => "restricted",
            Self::Left => "left",
            Self::Kicked => "kicked",
        }
    }
}

/// Effect of a status change on the Membership row
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MembershipEffect {
    Joined,
    Left,
}

/// Effect of a status change on the chat's admin set
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AdminEffect {
    Promoted,
    Demoted,
}

/// Classified membership-status transition
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct StatusChange {
    pub membership: Option<MembershipEffect>,
    pub admin: Option<AdminEffect>,
}

impl StatusChange {
    /// Classify an `old -> new` transition
    pub fn classify(old: MemberStatus, new: MemberStatus) -> Self {
        let membership = if old.is_not_member() && new.is_member() {
            Some(MembershipEffect::Joined)
        } else if old.is_member() && new.is_not_member() {
            Some(MembershipEffect::Left)
        } else {
            None
        };

        let admin = match (old.is_admin(), new.is_admin()) {
            (false, true) => Some(AdminEffect::Promoted),
            (true, false) => Some(AdminEffect::Demoted),
            _ => None,
        };

        Self { membership, admin }
    }

    pub fn is_noop(&self) -> bool {
        self.membership.is_none() && self.admin.is_none()
    }
}
