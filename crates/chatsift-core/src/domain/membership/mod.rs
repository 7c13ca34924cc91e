//! Peers and chat membership
//!
//! Membership drives search-scope visibility: a peer only ever sees hits from chats
//! it is currently recorded in.

pub mod entity;
pub mod registry;

pub use entity::{
    AdminEffect, MemberStatus, MembershipEffect, Peer, PeerProfile, StatusChange,
};
pub use registry::MembershipRegistry;
