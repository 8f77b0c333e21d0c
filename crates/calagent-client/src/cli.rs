//! Command-line interface definition.

use std::path::PathBuf;

use calagent_providers::{DEFAULT_MAX_RESULTS, PRIMARY_CALENDAR, SortOrder};
use clap::{Args, Parser, Subcommand};

/// calagent - your Google Calendar from the terminal, with a chat assistant
#[derive(Debug, Parser)]
#[command(name = "calagent")]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    /// Path to configuration file
    #[arg(long, short, global = true, env = "CALAGENT_CONFIG")]
    pub config: Option<PathBuf>,

    /// Enable debug output
    #[arg(long, short = 'v', global = true)]
    pub debug: bool,

    #[command(subcommand)]
    pub command: Command,
}

/// Available commands.
#[derive(Debug, Subcommand)]
pub enum Command {
    /// List upcoming events, soonest first
    List {
        /// Maximum number of events
        #[arg(long, short = 'n', default_value_t = DEFAULT_MAX_RESULTS)]
        max_results: usize,

        /// Calendar to read
        #[arg(long, default_value = PRIMARY_CALENDAR)]
        calendar_id: String,
    },

    /// List the calendars you can access
    Calendars,

    /// Search events by keyword
    Search(SearchArgs),

    /// Show one event in full
    Get {
        /// Event ID (as shown by list or search)
        event_id: String,

        /// Calendar holding the event
        #[arg(long, default_value = PRIMARY_CALENDAR)]
        calendar_id: String,
    },

    /// Create an event
    Create(CreateArgs),

    /// Change fields of an existing event
    Update(UpdateArgs),

    /// Delete an event
    Delete {
        /// Event ID
        event_id: String,
    },

    /// Authenticate with Google Calendar
    Auth {
        /// Only report the state of the stored token
        #[arg(long, conflicts_with = "refresh")]
        status: bool,

        /// Refresh the stored token without the browser flow
        #[arg(long)]
        refresh: bool,
    },

    /// Talk to the calendar assistant
    Chat,
}

#[derive(Debug, Args)]
pub struct SearchArgs {
    /// Text to look for in titles and descriptions
    pub query: String,

    /// Maximum number of events
    #[arg(long, short = 'n', default_value_t = DEFAULT_MAX_RESULTS)]
    pub max_results: usize,

    /// Window start, ISO-8601 (default now)
    #[arg(long)]
    pub start_time: Option<String>,

    /// Window end, ISO-8601
    #[arg(long)]
    pub end_time: Option<String>,

    /// Result order: startTime or updated
    #[arg(long, default_value = "startTime")]
    pub order: SortOrder,

    /// Calendar to search
    #[arg(long, default_value = PRIMARY_CALENDAR)]
    pub calendar_id: String,
}

#[derive(Debug, Args)]
pub struct CreateArgs {
    /// Event title
    pub summary: String,

    /// Start, ISO-8601 (a bare date makes an all-day event)
    pub start: String,

    /// End, ISO-8601
    pub end: String,

    #[arg(long)]
    pub description: Option<String>,

    #[arg(long)]
    pub location: Option<String>,

    /// Attendee email (can be repeated)
    #[arg(long = "attendee", action = clap::ArgAction::Append)]
    pub attendees: Vec<String>,
}

#[derive(Debug, Args)]
pub struct UpdateArgs {
    /// Event ID
    pub event_id: String,

    #[arg(long)]
    pub summary: Option<String>,

    /// New start, ISO-8601
    #[arg(long)]
    pub start_time: Option<String>,

    /// New end, ISO-8601
    #[arg(long)]
    pub end_time: Option<String>,

    #[arg(long)]
    pub description: Option<String>,

    #[arg(long)]
    pub location: Option<String>,

    /// Attendee email; replaces the whole list (can be repeated)
    #[arg(long = "attendee", action = clap::ArgAction::Append)]
    pub attendees: Vec<String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(args: &[&str]) -> Cli {
        Cli::try_parse_from(std::iter::once("calagent").chain(args.iter().copied())).unwrap()
    }

    #[test]
    fn cli_definition_is_valid() {
        use clap::CommandFactory;
        Cli::command().debug_assert();
    }

    #[test]
    fn list_defaults() {
        match parse(&["list"]).command {
            Command::List {
                max_results,
                calendar_id,
            } => {
                assert_eq!(max_results, 10);
                assert_eq!(calendar_id, "primary");
            }
            other => panic!("unexpected command: {other:?}"),
        }
    }

    #[test]
    fn global_flags_after_subcommand() {
        let cli = parse(&["calendars", "--debug", "--config", "/tmp/c.toml"]);
        assert!(cli.debug);
        assert_eq!(cli.config, Some(PathBuf::from("/tmp/c.toml")));
    }

    #[test]
    fn search_order() {
        match parse(&["search", "standup", "--order", "updated"]).command {
            Command::Search(args) => {
                assert_eq!(args.query, "standup");
                assert_eq!(args.order, SortOrder::Updated);
            }
            other => panic!("unexpected command: {other:?}"),
        }
        assert!(Cli::try_parse_from(["calagent", "search", "x", "--order", "random"]).is_err());
    }

    #[test]
    fn create_with_repeated_attendees() {
        match parse(&[
            "create",
            "Team Sync",
            "2025-10-09T14:00:00",
            "2025-10-09T15:00:00",
            "--attendee",
            "a@example.com",
            "--attendee",
            "b@example.com",
        ])
        .command
        {
            Command::Create(args) => {
                assert_eq!(args.summary, "Team Sync");
                assert_eq!(args.attendees, vec!["a@example.com", "b@example.com"]);
            }
            other => panic!("unexpected command: {other:?}"),
        }
    }

    #[test]
    fn auth_flags_conflict() {
        assert!(Cli::try_parse_from(["calagent", "auth", "--status", "--refresh"]).is_err());
    }
}
