//! CLI argument definitions using clap derive macros.

use std::path::PathBuf;

use clap::{Parser, Subcommand};

/// Fetch documents from OpenRosa-compatible servers.
///
/// Downloads form lists, manifests and forms, answering authentication
/// challenges with stored or prompted credentials.
#[derive(Parser, Debug)]
#[command(name = "openrosa")]
#[command(author, version, about)]
pub struct Args {
    /// Increase output verbosity (-v for debug, -vv for trace)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,

    /// Suppress non-error output
    #[arg(short, long, global = true, conflicts_with = "verbose")]
    pub quiet: bool,

    /// OpenRosa server URL (overrides `server_url` from the config file)
    #[arg(long, global = true, value_name = "URL")]
    pub server: Option<String>,

    /// Path to a config file (default: $XDG_CONFIG_HOME/openrosa/config.toml)
    #[arg(long, global = true, value_name = "PATH")]
    pub config: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Fetch and parse an XML document
    Fetch {
        /// Document URL
        url: String,
    },
    /// Send an OpenRosa HEAD probe
    Probe {
        /// Endpoint URL
        url: String,
    },
    /// Manage stored credentials
    #[command(subcommand)]
    Credentials(CredentialsCommand),
}

#[derive(Subcommand, Debug)]
pub enum CredentialsCommand {
    /// Store credentials for a server URL; the password is read from stdin
    Set {
        /// Server URL prefix
        url: String,
        /// Username
        username: String,
    },
    /// Remove credentials stored for a server URL
    Clear {
        /// Server URL prefix
        url: String,
    },
    /// Show which username would be used for a URL
    Show {
        /// URL to look up
        url: String,
    },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cli_fetch_parses_url() {
        let args = Args::try_parse_from(["openrosa", "fetch", "https://srv.example/formList"])
            .unwrap();
        assert_eq!(args.verbose, 0);
        assert!(!args.quiet);
        assert!(matches!(
            args.command,
            Command::Fetch { ref url } if url == "https://srv.example/formList"
        ));
    }

    #[test]
    fn test_cli_verbose_flag_increments_count() {
        let args = Args::try_parse_from(["openrosa", "-v", "fetch", "http://a"]).unwrap();
        assert_eq!(args.verbose, 1);

        let args = Args::try_parse_from(["openrosa", "fetch", "http://a", "-vv"]).unwrap();
        assert_eq!(args.verbose, 2);
    }

    #[test]
    fn test_cli_quiet_conflicts_with_verbose() {
        let args = Args::try_parse_from(["openrosa", "-q", "probe", "http://a"]).unwrap();
        assert!(args.quiet);

        let err = Args::try_parse_from(["openrosa", "-q", "-v", "probe", "http://a"]).unwrap_err();
        assert_eq!(err.kind(), clap::error::ErrorKind::ArgumentConflict);
    }

    #[test]
    fn test_cli_global_server_and_config() {
        let args = Args::try_parse_from([
            "openrosa",
            "fetch",
            "http://a/formList",
            "--server",
            "http://a",
            "--config",
            "/tmp/openrosa.toml",
        ])
        .unwrap();
        assert_eq!(args.server.as_deref(), Some("http://a"));
        assert_eq!(args.config, Some(PathBuf::from("/tmp/openrosa.toml")));
    }

    #[test]
    fn test_cli_credentials_subcommands() {
        let args =
            Args::try_parse_from(["openrosa", "credentials", "set", "http://a", "alice"]).unwrap();
        assert!(matches!(
            args.command,
            Command::Credentials(CredentialsCommand::Set { ref url, ref username })
                if url == "http://a" && username == "alice"
        ));

        let args = Args::try_parse_from(["openrosa", "credentials", "clear", "http://a"]).unwrap();
        assert!(matches!(
            args.command,
            Command::Credentials(CredentialsCommand::Clear { .. })
        ));

        let args = Args::try_parse_from(["openrosa", "credentials", "show", "http://a"]).unwrap();
        assert!(matches!(
            args.command,
            Command::Credentials(CredentialsCommand::Show { .. })
        ));
    }

    #[test]
    fn test_cli_missing_subcommand_is_error() {
        let err = Args::try_parse_from(["openrosa"]).unwrap_err();
        assert_eq!(
            err.kind(),
            clap::error::ErrorKind::DisplayHelpOnMissingArgumentOrSubcommand
        );
    }

    #[test]
    fn test_cli_help_flag_shows_usage() {
        let err = Args::try_parse_from(["openrosa", "--help"]).unwrap_err();
        assert_eq!(err.kind(), clap::error::ErrorKind::DisplayHelp);
    }

    #[test]
    fn test_cli_version_flag_shows_version() {
        let err = Args::try_parse_from(["openrosa", "--version"]).unwrap_err();
        assert_eq!(err.kind(), clap::error::ErrorKind::DisplayVersion);
    }

    #[test]
    fn test_cli_invalid_flag_returns_error() {
        let err = Args::try_parse_from(["openrosa", "--invalid-flag"]).unwrap_err();
        assert_eq!(err.kind(), clap::error::ErrorKind::UnknownArgument);
    }
}
