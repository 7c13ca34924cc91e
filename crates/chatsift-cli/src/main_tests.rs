//! CLI argument parsing tests

use clap::Parser;

use crate::{ChatAction, Cli, Commands, ConfigAction, MemberAction, OutputFormat};

#[test]
fn test_global_flags() {
    let cli = Cli::try_parse_from([
        "chatsift",
        "--database",
        "/tmp/index.db",
        "--format",
        "json",
        "-q",
        "doctor",
    ])
    .unwrap();

    assert_eq!(cli.database.as_deref(), Some(std::path::Path::new("/tmp/index.db")));
    assert!(cli.format == OutputFormat::Json);
    assert!(cli.quiet);
    assert!(matches!(cli.command, Commands::Doctor));
}

#[test]
fn test_global_flags_after_subcommand() {
    let cli = Cli::try_parse_from(["chatsift", "chats", "show", "--format", "json"]).unwrap();
    assert!(cli.format == OutputFormat::Json);
    assert!(matches!(
        cli.command,
        Commands::Chats {
            action: ChatAction::Show { id: None }
        }
    ));
}

#[test]
fn test_chat_ids_accept_negative_values() {
    let cli = Cli::try_parse_from([
        "chatsift",
        "chats",
        "enable",
        "--title",
        "General",
        "--",
        "-1001234",
    ])
    .unwrap();

    match cli.command {
        Commands::Chats {
            action: ChatAction::Enable { id, title },
        } => {
            assert_eq!(id, -1001234);
            assert_eq!(title, "General");
        }
        _ => panic!("expected chats enable"),
    }
}

#[test]
fn test_post_defaults() {
    let cli = Cli::try_parse_from([
        "chatsift",
        "post",
        "--chat=-1001234",
        "--from",
        "7",
        "--msg-id",
        "56",
        "hello world",
    ])
    .unwrap();

    match cli.command {
        Commands::Post {
            chat,
            from,
            msg_id,
            name,
            username,
            date,
            edit_date,
            text,
        } => {
            assert_eq!(chat, -1001234);
            assert_eq!(from, 7);
            assert_eq!(msg_id, 56);
            assert_eq!(name, "");
            assert!(username.is_none());
            assert!(date.is_none());
            assert!(edit_date.is_none());
            assert_eq!(text, "hello world");
        }
        _ => panic!("expected post"),
    }
}

#[test]
fn test_search_collects_query_words() {
    let cli = Cli::try_parse_from(["chatsift", "search", "--as", "7", "@ada", "rust", "async", "2"])
        .unwrap();

    match cli.command {
        Commands::Search { requester, query } => {
            assert_eq!(requester, 7);
            assert_eq!(query.join(" "), "@ada rust async 2");
        }
        _ => panic!("expected search"),
    }
}

#[test]
fn test_search_query_may_be_empty() {
    let cli = Cli::try_parse_from(["chatsift", "search", "--as", "7"]).unwrap();
    assert!(matches!(cli.command, Commands::Search { ref query, .. } if query.is_empty()));
}

#[test]
fn test_delete_repeated_admins() {
    let cli = Cli::try_parse_from([
        "chatsift",
        "delete",
        "--as",
        "3",
        "--chat=-1001234",
        "--admin",
        "9",
        "--admin",
        "10",
        "https://t.me/c/1234/56",
    ])
    .unwrap();

    match cli.command {
        Commands::Delete {
            requester,
            chat,
            admins,
            link,
        } => {
            assert_eq!(requester, 3);
            assert_eq!(chat, -1001234);
            assert_eq!(admins, vec![9, 10]);
            assert_eq!(link, "https://t.me/c/1234/56");
        }
        _ => panic!("expected delete"),
    }
}

#[test]
fn test_members_add() {
    let cli = Cli::try_parse_from([
        "chatsift",
        "members",
        "add",
        "--chat=-1001234",
        "--peer",
        "7",
        "--username",
        "ada",
    ])
    .unwrap();

    assert!(matches!(
        cli.command,
        Commands::Members {
            action: MemberAction::Add { chat: -1001234, peer: 7, ref username, .. }
        } if username.as_deref() == Some("ada")
    ));
}

#[test]
fn test_config_set() {
    let cli = Cli::try_parse_from(["chatsift", "config", "set", "search.page_size", "20"]).unwrap();
    match cli.command {
        Commands::Config {
            action: ConfigAction::Set { key, value },
        } => {
            assert_eq!(key, "search.page_size");
            assert_eq!(value, "20");
        }
        _ => panic!("expected config set"),
    }
}

#[test]
fn test_rejects_unknown_format() {
    assert!(Cli::try_parse_from(["chatsift", "--format", "yaml", "doctor"]).is_err());
}

#[test]
fn test_search_requires_requester() {
    assert!(Cli::try_parse_from(["chatsift", "search", "rust"]).is_err());
}
