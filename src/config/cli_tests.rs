//! Tests for CLI argument parsing.

use clap::Parser;

use super::cli::{Cli, Command};

mod parsing {
    use super::*;

    #[test]
    fn no_subcommand_means_run() {
        let cli = Cli::parse_from_iter(["battle-push"]);

        assert!(cli.command.is_none());
        assert!(cli.is_run());
        assert!(!cli.is_init());
    }

    #[test]
    fn parse_poller_options() {
        let cli = Cli::parse_from_iter([
            "battle-push",
            "--poll-interval",
            "30",
            "--fetch-timeout",
            "10",
            "--max-concurrency",
            "8",
        ]);

        assert_eq!(cli.poll_interval, Some(30));
        assert_eq!(cli.fetch_timeout, Some(10));
        assert_eq!(cli.max_concurrency, Some(8));
    }

    #[test]
    fn parse_source_options() {
        let cli = Cli::parse_from_iter([
            "battle-push",
            "--api-url",
            "https://camp.example.com",
            "--token-url",
            "https://token.example.com/token",
            "--header",
            "gameareaid=2",
            "--header",
            "X-Trace: abc",
        ]);

        assert_eq!(cli.api_url.as_deref(), Some("https://camp.example.com"));
        assert_eq!(
            cli.token_url.as_deref(),
            Some("https://token.example.com/token")
        );
        assert_eq!(cli.headers, vec!["gameareaid=2", "X-Trace: abc"]);
    }

    #[test]
    fn parse_notifier_options() {
        let cli = Cli::parse_from_iter([
            "battle-push",
            "--notify-url",
            "http://127.0.0.1:5700",
            "--access-token",
            "secret",
            "--dry-run",
        ]);

        assert_eq!(cli.notify_url.as_deref(), Some("http://127.0.0.1:5700"));
        assert_eq!(cli.access_token.as_deref(), Some("secret"));
        assert!(cli.dry_run);
    }

    #[test]
    fn parse_retry_options() {
        let cli = Cli::parse_from_iter(["battle-push", "--retry-max", "5", "--retry-delay", "2"]);

        assert_eq!(cli.retry_max, Some(5));
        assert_eq!(cli.retry_delay, Some(2));
    }

    #[test]
    fn global_options_after_subcommand() {
        let cli = Cli::parse_from_iter([
            "battle-push",
            "status",
            "--user",
            "10001",
            "--data-dir",
            "/tmp/state",
            "-v",
        ]);

        assert_eq!(
            cli.data_dir.as_deref(),
            Some(std::path::Path::new("/tmp/state"))
        );
        assert!(cli.verbose);
    }
}

mod subcommands {
    use super::*;

    #[test]
    fn init_default_output() {
        let cli = Cli::parse_from_iter(["battle-push", "init"]);

        assert!(cli.is_init());
        assert!(!cli.is_run());
        match cli.command {
            Some(Command::Init { output }) => {
                assert_eq!(output.to_str(), Some("battle-push.toml"));
            }
            other => panic!("expected init, got {other:?}"),
        }
    }

    #[test]
    fn init_custom_output() {
        let cli = Cli::parse_from_iter(["battle-push", "init", "-o", "custom.toml"]);

        match cli.command {
            Some(Command::Init { output }) => assert_eq!(output.to_str(), Some("custom.toml")),
            other => panic!("expected init, got {other:?}"),
        }
    }

    #[test]
    fn explicit_run() {
        let cli = Cli::parse_from_iter(["battle-push", "run"]);
        assert!(cli.is_run());
    }

    #[test]
    fn subscribe_with_group_and_entity() {
        let cli = Cli::parse_from_iter([
            "battle-push",
            "subscribe",
            "--user",
            "10001",
            "--entity",
            "556677",
            "--group",
            "900",
        ]);

        match cli.command {
            Some(Command::Subscribe {
                user,
                entity,
                group,
            }) => {
                assert_eq!(user.user, "10001");
                assert_eq!(entity.as_deref(), Some("556677"));
                assert_eq!(group.as_deref(), Some("900"));
            }
            other => panic!("expected subscribe, got {other:?}"),
        }
    }

    #[test]
    fn subscribe_defaults_to_current_account_and_direct() {
        let cli = Cli::parse_from_iter(["battle-push", "subscribe", "--user", "10001"]);

        match cli.command {
            Some(Command::Subscribe { entity, group, .. }) => {
                assert!(entity.is_none());
                assert!(group.is_none());
            }
            other => panic!("expected subscribe, got {other:?}"),
        }
    }

    #[test]
    fn unsubscribe_group_conflicts_with_direct() {
        let result = Cli::try_parse_from([
            "battle-push",
            "unsubscribe",
            "--user",
            "10001",
            "--group",
            "900",
            "--direct",
        ]);

        assert!(result.is_err());
    }

    #[test]
    fn subscribe_requires_user() {
        let result = Cli::try_parse_from(["battle-push", "subscribe"]);
        assert!(result.is_err());
    }

    #[test]
    fn account_commands_take_positionals() {
        let bind = Cli::parse_from_iter(["battle-push", "bind", "--user", "1", "556677"]);
        assert!(matches!(
            bind.command,
            Some(Command::Bind { ref entity, .. }) if entity == "556677"
        ));

        let switch = Cli::parse_from_iter(["battle-push", "switch", "--user", "1", "2"]);
        assert!(matches!(switch.command, Some(Command::Switch { index: 2, .. })));

        let unbind = Cli::parse_from_iter(["battle-push", "unbind", "--user", "1", "3"]);
        assert!(matches!(unbind.command, Some(Command::Unbind { index: 3, .. })));
    }

    #[test]
    fn battles_defaults_to_five_of_current_account() {
        let cli = Cli::parse_from_iter(["battle-push", "battles", "--user", "10001"]);

        match cli.command {
            Some(Command::Battles { user, entity, count }) => {
                assert_eq!(user.user, "10001");
                assert!(entity.is_none());
                assert_eq!(count, 5);
            }
            other => panic!("expected battles, got {other:?}"),
        }
    }

    #[test]
    fn battles_with_entity_and_count() {
        let cli = Cli::parse_from_iter([
            "battle-push",
            "battles",
            "--user",
            "10001",
            "--entity",
            "556677",
            "-n",
            "3",
        ]);

        assert!(matches!(
            cli.command,
            Some(Command::Battles { entity: Some(ref e), count: 3, .. }) if e == "556677"
        ));
    }

    #[test]
    fn battles_count_must_be_in_range() {
        for count in ["0", "16"] {
            let result =
                Cli::try_parse_from(["battle-push", "battles", "--user", "1", "--count", count]);
            assert!(result.is_err(), "count {count} should be rejected");
        }
    }
}
