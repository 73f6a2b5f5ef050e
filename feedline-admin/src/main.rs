use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use feedline_server::{config::Settings, pipeline::Pipeline};
use feedline_types::{PipelineReport, ResetSummary, SeedSummary, TopologyReport};
use serde::Serialize;
use std::io::{BufRead, Write};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

/// Feedline Admin Utility
///
/// Provisions the feed topology, clears activities and follows, and seeds
/// sample content against the configured feed service.
#[derive(Parser, Debug)]
#[command(name = "feedline-admin")]
#[command(about = "Provision, reset and seed Feedline feeds", long_about = None)]
struct Args {
    /// Settings file to use instead of settings.toml and the environment
    #[arg(short, long)]
    config: Option<String>,

    /// Print the run summary as JSON
    #[arg(long)]
    json: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Create feed groups and views
    Setup,
    /// Delete every activity and follow edge
    Reset {
        /// Skip confirmation prompt
        #[arg(short = 'y', long)]
        yes: bool,
    },
    /// Seed sample users and content without clearing anything
    Seed {
        /// User id that authors the seeded likes and comments
        #[arg(short, long, env = "FEEDLINE_USER")]
        user: String,
    },
    /// Reset, then seed from scratch
    ResetAndSeed {
        /// User id that authors the seeded likes and comments
        #[arg(short, long, env = "FEEDLINE_USER")]
        user: String,

        /// Skip confirmation prompt
        #[arg(short = 'y', long)]
        yes: bool,
    },
}

impl Command {
    fn name(&self) -> &'static str {
        match self {
            Command::Setup => "setup",
            Command::Reset { .. } => "reset",
            Command::Seed { .. } => "seed",
            Command::ResetAndSeed { .. } => "reset-and-seed",
        }
    }
}

fn load_settings(path: Option<&str>) -> Result<Settings> {
    match path {
        Some(path) => Settings::from_file(path)
            .with_context(|| format!("Failed to load settings from {}", path)),
        None => Settings::new().context("Failed to load settings"),
    }
}

fn is_confirmation(input: &str) -> bool {
    let input = input.trim().to_lowercase();
    input == "y" || input == "yes"
}

/// Ask before deleting anything; `true` means go ahead.
///
/// The prompt is written to `prompt`, which is stderr in practice so
/// `--json` output on stdout stays parseable.
fn confirm(base_url: &str, input: &mut impl BufRead, prompt: &mut impl Write) -> Result<bool> {
    writeln!(prompt, "This will delete every activity and follow on {}.", base_url)?;
    writeln!(prompt, "Do you want to continue? (y/N): ")?;
    prompt.flush()?;

    let mut answer = String::new();
    input
        .read_line(&mut answer)
        .context("Failed to read user input")?;
    Ok(is_confirmation(&answer))
}

fn confirm_on_terminal(settings: &Settings) -> Result<bool> {
    confirm(
        &settings.feed_service.base_url,
        &mut std::io::stdin().lock(),
        &mut std::io::stderr(),
    )
}

fn display_topology(report: &TopologyReport) {
    println!();
    println!("Topology Summary");
    println!("================");
    println!();
    println!("Feed groups: {}", report.feed_groups.join(", "));
    println!("Feed views: {}", report.feed_views.join(", "));
    println!("Already existing: {}", report.already_existing.len());
}

fn display_reset(summary: &ResetSummary) {
    println!();
    println!("Reset Summary");
    println!("=============");
    println!();
    println!("Activities deleted: {}", summary.activities_deleted);
    println!("Follows deleted: {}", summary.follows_deleted);
    println!("Activity pages: {}", summary.activity_pages);
    println!("Follow pages: {}", summary.follow_pages);

    if summary.follows_failed > 0 {
        println!("Follows skipped after errors: {}", summary.follows_failed);
    }
    if summary.truncated {
        println!();
        println!("Page cap reached - some data may remain. Run reset again.");
    }
}

fn display_seed(summary: &SeedSummary) {
    println!();
    println!("Seed Summary");
    println!("============");
    println!();
    println!("Users: {}", summary.user_ids.join(", "));
    println!(
        "Activities created: {} / {}",
        summary.activity_ids.len(),
        summary.users_attempted
    );
    println!("Hashtag feeds: {}", summary.hashtag_feeds.len());
    println!("Reactions added: {}", summary.reactions_added);
    println!("Comments added: {}", summary.comments_added);

    if !summary.failures.is_empty() {
        println!();
        println!("Skipped steps: {}", summary.failures.len());
        for (i, failure) in summary.failures.iter().enumerate() {
            match &failure.user_id {
                Some(user_id) => println!(
                    "  {}. [{}] {}: {}",
                    i + 1,
                    failure.stage.as_str(),
                    user_id,
                    failure.message
                ),
                None => println!("  {}. [{}] {}", i + 1, failure.stage.as_str(), failure.message),
            }
        }
    }
}

fn display_report(report: &PipelineReport) {
    if let Some(reset) = &report.reset {
        display_reset(reset);
    }
    display_seed(&report.seed);
    println!();
    if report.seed.is_degraded() {
        println!("Seeding finished with skipped steps.");
    } else {
        println!("Seeding completed successfully!");
    }
}

fn log_seed_outcome(report: &PipelineReport) {
    if report.seed.is_degraded() {
        tracing::warn!(
            activities = report.seed.activity_ids.len(),
            skipped = report.seed.failures.len(),
            "Seeding finished with skipped steps"
        );
    } else {
        tracing::info!(activities = report.seed.activity_ids.len(), "Seeding finished");
    }
}

fn print_json<T: Serialize>(value: &T) -> Result<()> {
    let json = serde_json::to_string_pretty(value).context("Failed to serialize summary")?;
    println!("{}", json);
    Ok(())
}

#[tokio::main]
async fn main() -> Result<()> {
    dotenv::dotenv().ok();
    let args = Args::parse();

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "feedline_admin=info,feedline_server=info".into()),
        )
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    let settings = load_settings(args.config.as_deref())?;
    let pipeline = Pipeline::from_settings(&settings)?;
    tracing::info!(
        command = args.command.name(),
        base_url = %settings.feed_service.base_url,
        "Running admin command"
    );

    match args.command {
        Command::Setup => {
            let report = pipeline.ensure_topology().await?;
            tracing::info!(existing = report.already_existing.len(), "Setup finished");
            if args.json {
                print_json(&report)?;
            } else {
                display_topology(&report);
            }
        }
        Command::Reset { yes } => {
            if !yes && !confirm_on_terminal(&settings)? {
                eprintln!("Reset cancelled.");
                return Ok(());
            }
            let summary = pipeline.reset_feeds().await?;
            tracing::info!(
                activities = summary.activities_deleted,
                follows = summary.follows_deleted,
                truncated = summary.truncated,
                "Reset finished"
            );
            if args.json {
                print_json(&summary)?;
            } else {
                display_reset(&summary);
            }
        }
        Command::Seed { user } => {
            let report = pipeline.seed_only(&user).await?;
            log_seed_outcome(&report);
            if args.json {
                print_json(&report)?;
            } else {
                display_report(&report);
            }
        }
        Command::ResetAndSeed { user, yes } => {
            if !yes && !confirm_on_terminal(&settings)? {
                eprintln!("Reset cancelled.");
                return Ok(());
            }
            let report = pipeline.reset_and_seed(&user).await?;
            log_seed_outcome(&report);
            if args.json {
                print_json(&report)?;
            } else {
                display_report(&report);
            }
        }
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn test_cli_definition_is_valid() {
        Args::command().debug_assert();
    }

    #[test]
    fn test_reset_and_seed_parses() {
        let args = Args::try_parse_from([
            "feedline-admin",
            "--json",
            "reset-and-seed",
            "--user",
            "operator",
            "--yes",
        ])
        .unwrap();

        assert!(args.json);
        match args.command {
            Command::ResetAndSeed { user, yes } => {
                assert_eq!(user, "operator");
                assert!(yes);
            }
            other => panic!("unexpected command: {:?}", other),
        }
    }

    #[test]
    fn test_command_names_match_subcommands() {
        for (argv, name) in [
            (vec!["feedline-admin", "setup"], "setup"),
            (vec!["feedline-admin", "reset", "--yes"], "reset"),
            (vec!["feedline-admin", "seed", "--user", "operator"], "seed"),
        ] {
            let args = Args::try_parse_from(argv).unwrap();
            assert_eq!(args.command.name(), name);
        }
    }

    #[test]
    fn test_user_help_names_the_interaction_author() {
        let mut command = Args::command();
        let seed = command.find_subcommand_mut("seed").unwrap();
        let help = seed.render_help().to_string();
        assert!(help.contains("authors the seeded likes and comments"));
    }

    #[test]
    fn test_confirm_prompts_on_the_given_writer() {
        let mut input = std::io::Cursor::new("yes\n");
        let mut prompt = Vec::new();

        let confirmed = confirm("http://feeds.test", &mut input, &mut prompt).unwrap();

        assert!(confirmed);
        let prompt = String::from_utf8(prompt).unwrap();
        assert!(prompt.contains("http://feeds.test"));
        assert!(prompt.contains("(y/N)"));
    }

    #[test]
    fn test_confirm_defaults_to_no() {
        let mut input = std::io::Cursor::new("\n");
        let mut prompt = Vec::new();

        assert!(!confirm("http://feeds.test", &mut input, &mut prompt).unwrap());
    }

    #[test]
    fn test_confirmation_accepts_only_yes() {
        assert!(is_confirmation("y\n"));
        assert!(is_confirmation(" YES "));
        assert!(!is_confirmation("\n"));
        assert!(!is_confirmation("no"));
    }
}
