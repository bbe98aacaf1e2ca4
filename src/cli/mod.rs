pub mod commands;

use clap::{Args, Parser, Subcommand};

#[derive(Parser)]
#[command(name = "feedwire")]
#[command(about = "Command-line client for a hosted activity-feed service", long_about = None)]
pub struct Cli {
    /// Feed token used to sign every request
    #[arg(short, long, global = true, default_value = "")]
    pub token: String,

    #[command(subcommand)]
    pub command: Commands,
}

/// Feed reference in `slug:user_id` form.
#[derive(Args)]
pub struct FeedArg {
    /// Feed to operate on, e.g. `user:alice`
    pub feed: String,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Read activities from a feed
    Get {
        #[command(flatten)]
        feed: FeedArg,

        #[arg(short, long)]
        limit: Option<u32>,

        #[arg(long)]
        offset: Option<u32>,

        /// Only activities older than this id
        #[arg(long)]
        id_lt: Option<String>,

        /// Only activities newer than this id
        #[arg(long)]
        id_gt: Option<String>,

        /// Ranking method for ranked feeds
        #[arg(long)]
        ranking: Option<String>,

        /// Include the current user's reactions (enriched read)
        #[arg(long)]
        own_reactions: bool,

        /// Include reaction counts (enriched read)
        #[arg(long)]
        reaction_counts: bool,

        /// Include recent reactions (enriched read)
        #[arg(long)]
        recent_reactions: bool,

        /// Force the enriched endpoint on or off
        #[arg(long)]
        enrich: Option<bool>,

        /// Mark notifications as read
        #[arg(long)]
        mark_read: bool,

        /// Mark notifications as seen
        #[arg(long)]
        mark_seen: bool,
    },
    /// Add an activity
    Add {
        #[command(flatten)]
        feed: FeedArg,

        verb: String,

        object: String,

        /// Defaults to the configured user
        #[arg(long)]
        actor: Option<String>,

        #[arg(long, requires = "time")]
        foreign_id: Option<String>,

        #[arg(long)]
        time: Option<String>,

        /// Additional feeds to deliver to (repeatable)
        #[arg(long = "to")]
        to: Vec<String>,
    },
    /// Remove an activity by id, or by foreign id with `--foreign`
    Remove {
        #[command(flatten)]
        feed: FeedArg,

        activity: String,

        #[arg(long)]
        foreign: bool,
    },
    /// Follow another feed
    Follow {
        #[command(flatten)]
        feed: FeedArg,

        /// Feed to follow, `slug:user_id`
        target: String,

        /// How many existing activities to copy
        #[arg(long)]
        activity_copy_limit: Option<u32>,
    },
    /// Stop following a feed
    Unfollow {
        #[command(flatten)]
        feed: FeedArg,

        /// Feed to unfollow, `slug:user_id`
        target: String,

        #[arg(long)]
        keep_history: bool,
    },
    /// List the feeds a feed follows
    Following {
        #[command(flatten)]
        feed: FeedArg,

        #[command(flatten)]
        page: PageArgs,
    },
    /// List the feeds following a feed
    Followers {
        #[command(flatten)]
        feed: FeedArg,

        #[command(flatten)]
        page: PageArgs,
    },
    /// Edit the "to" targets of an activity
    Targets {
        #[command(flatten)]
        feed: FeedArg,

        foreign_id: String,

        time: String,

        /// Replace all targets (repeatable)
        #[arg(long = "new")]
        new_targets: Vec<String>,

        /// Targets to add (repeatable)
        #[arg(long = "add")]
        added_targets: Vec<String>,

        /// Targets to remove (repeatable)
        #[arg(long = "remove")]
        removed_targets: Vec<String>,
    },
    /// Print real-time updates of a feed until interrupted
    Listen {
        #[command(flatten)]
        feed: FeedArg,
    },
}

#[derive(Args)]
pub struct PageArgs {
    #[arg(short, long)]
    pub limit: Option<u32>,

    #[arg(long)]
    pub offset: Option<u32>,

    /// Restrict to these feed ids (repeatable)
    #[arg(long)]
    pub filter: Vec<String>,
}
