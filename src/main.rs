use clap::Parser;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use feedwire::app::ClientContext;
use feedwire::cli::commands::{self, AddArgs, GetArgs, TargetArgs};
use feedwire::cli::{Cli, Commands};
use feedwire::config::Config;
use feedwire::normalizer::EnrichmentOptions;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize tracing
    tracing_subscriber::registry()
        .with(fmt::layer().with_writer(std::io::stderr))
        .with(EnvFilter::from_default_env())
        .init();

    let cli = Cli::parse();
    let config = Config::load()?;
    let ctx = ClientContext::from_config(&config)?;
    let token = cli.token.as_str();

    match cli.command {
        Commands::Get {
            feed,
            limit,
            offset,
            id_lt,
            id_gt,
            ranking,
            own_reactions,
            reaction_counts,
            recent_reactions,
            enrich,
            mark_read,
            mark_seen,
        } => {
            let mut enrichment = EnrichmentOptions::new();
            if own_reactions {
                enrichment = enrichment.with_own_reactions(true);
            }
            if reaction_counts {
                enrichment = enrichment.with_reaction_counts(true);
            }
            if recent_reactions {
                enrichment = enrichment.with_recent_reactions(true);
            }
            if let Some(enrich) = enrich {
                enrichment = enrichment.enrich(enrich);
            }
            let args = GetArgs {
                limit,
                offset,
                id_lt,
                id_gt,
                ranking,
                enrichment,
                mark_read,
                mark_seen,
            };
            commands::get(&ctx, token, &feed.feed, args).await?;
        }
        Commands::Add {
            feed,
            verb,
            object,
            actor,
            foreign_id,
            time,
            to,
        } => {
            let args = AddArgs {
                verb,
                object,
                actor,
                foreign_id,
                time,
                to,
            };
            commands::add(&ctx, token, &feed.feed, args).await?;
        }
        Commands::Remove {
            feed,
            activity,
            foreign,
        } => {
            commands::remove(&ctx, token, &feed.feed, &activity, foreign).await?;
        }
        Commands::Follow {
            feed,
            target,
            activity_copy_limit,
        } => {
            commands::follow(&ctx, token, &feed.feed, &target, activity_copy_limit).await?;
        }
        Commands::Unfollow {
            feed,
            target,
            keep_history,
        } => {
            commands::unfollow(&ctx, token, &feed.feed, &target, keep_history).await?;
        }
        Commands::Following { feed, page } => {
            let options = commands::list_options(page.limit, page.offset, page.filter);
            commands::following(&ctx, token, &feed.feed, options).await?;
        }
        Commands::Followers { feed, page } => {
            let options = commands::list_options(page.limit, page.offset, page.filter);
            commands::followers(&ctx, token, &feed.feed, options).await?;
        }
        Commands::Targets {
            feed,
            foreign_id,
            time,
            new_targets,
            added_targets,
            removed_targets,
        } => {
            let args = TargetArgs {
                foreign_id,
                time,
                new_targets,
                added_targets,
                removed_targets,
            };
            commands::targets(&ctx, token, &feed.feed, args).await?;
        }
        Commands::Listen { feed } => {
            commands::listen(&ctx, token, &feed.feed).await?;
        }
    }

    ctx.unsubscribe_all().await;
    Ok(())
}
