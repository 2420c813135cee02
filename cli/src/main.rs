mod commands;
mod config;
mod remote;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use std::process;
use std::sync::Arc;
use tracing_subscriber::EnvFilter;

use crate::commands::{
    ProfileArgs, cmd_add, cmd_history, cmd_intake, cmd_profile_pull, cmd_profile_set,
    cmd_profile_show, cmd_recommend, cmd_remove, cmd_show,
};
use crate::config::Config;
use crate::remote::HttpProfileStore;
use proteus_core::service::{MAX_HISTORY_DAYS, ProteusService};

#[derive(Parser)]
#[command(
    name = "proteus",
    version,
    about = "A local-first protein tracker with remote profile sync"
)]
struct Cli {
    /// Log engine activity to stderr (overrides RUST_LOG)
    #[arg(short, long, global = true)]
    verbose: bool,
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Log a food entry
    Add {
        /// Food name
        name: String,
        /// Protein in grams
        #[arg(short, long)]
        protein: f64,
        /// Calories
        #[arg(long, default_value = "0")]
        calories: f64,
        /// Carbs in grams
        #[arg(long, default_value = "0")]
        carbs: f64,
        /// Fat in grams
        #[arg(long, default_value = "0")]
        fat: f64,
        /// Serving size in grams (e.g. "150" or "150g")
        #[arg(short, long, default_value = "100")]
        serving: String,
        /// Meal type: breakfast, lunch, dinner, snack
        #[arg(short, long, default_value = "snack")]
        meal: String,
        /// Date to log for (YYYY-MM-DD or today/yesterday/tomorrow, default: today)
        #[arg(long)]
        date: Option<String>,
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
    /// Remove a food entry by ID (or a unique ID prefix)
    Remove {
        /// Entry ID
        entry_id: String,
        /// Date the entry was logged on (default: today)
        #[arg(long)]
        date: Option<String>,
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
    /// Show the entries and totals for a day (defaults to today)
    Show {
        /// Date to show (YYYY-MM-DD or today/yesterday/tomorrow)
        date: Option<String>,
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
    /// Show today's protein intake against the target
    Intake {
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
    /// Show totals for the last N days
    History {
        /// Number of days to show (1-366)
        #[arg(
            short,
            long,
            default_value = "7",
            value_parser = clap::value_parser!(u32).range(1..=i64::from(MAX_HISTORY_DAYS))
        )]
        days: u32,
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
    /// Manage the body profile that drives the protein target
    Profile {
        #[command(subcommand)]
        command: ProfileCommands,
    },
    /// Compute a protein target without changing any state
    Recommend {
        /// Body weight in kg
        weight: f64,
        /// Goal: weight_loss, maintenance, muscle_gain
        #[arg(short, long, default_value = "maintenance")]
        goal: String,
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
}

#[derive(Subcommand)]
enum ProfileCommands {
    /// Set profile fields and push them to the remote store when signed in
    Set {
        /// Body weight in kg
        #[arg(long)]
        weight: Option<f64>,
        /// Height in cm
        #[arg(long)]
        height: Option<f64>,
        /// Age in years
        #[arg(long)]
        age: Option<u32>,
        /// Gender: male, female, other
        #[arg(long)]
        gender: Option<String>,
        /// Activity: sedentary, light, moderate, active, very_active
        #[arg(long)]
        activity: Option<String>,
        /// Goal: weight_loss, maintenance, muscle_gain
        #[arg(long)]
        goal: Option<String>,
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
    /// Pull the signed-in user's profile from the remote store
    Pull {
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
    /// Show the stored profile and target
    Show {
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
}

fn init_tracing(verbose: bool) {
    let filter = if verbose {
        EnvFilter::new("proteus=debug,proteus_core=debug")
    } else {
        EnvFilter::try_from_default_env()
            .unwrap_or_else(|_| EnvFilter::new("proteus=warn,proteus_core=warn"))
    };
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

fn build_service(config: &Config) -> Result<ProteusService> {
    let db_path = config
        .db_path
        .to_str()
        .context("Database path is not valid UTF-8")?;
    let mut builder = ProteusService::builder(db_path)
        .with_context(|| format!("Failed to open database at {db_path}"))?
        .config(config.engine);

    if let Some(url) = &config.remote_url {
        let store = HttpProfileStore::new(url, config.remote_token.clone())?;
        builder = builder.remote(Arc::new(store));
    }
    if let Some(user_id) = &config.user_id {
        builder = builder.user_id(user_id.clone());
    }
    Ok(builder.build())
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();
    init_tracing(cli.verbose);

    if let Err(e) = run(cli).await {
        eprintln!("Error: {e:#}");
        process::exit(1);
    }
}

async fn run(cli: Cli) -> Result<()> {
    // Pure calculation; no database needed
    if let Commands::Recommend { weight, goal, json } = &cli.command {
        return cmd_recommend(*weight, goal, *json);
    }

    let config = Config::load()?;
    let svc = build_service(&config)?;

    match cli.command {
        Commands::Add {
            name,
            protein,
            calories,
            carbs,
            fat,
            serving,
            meal,
            date,
            json,
        } => cmd_add(
            &svc,
            &name,
            protein,
            calories,
            carbs,
            fat,
            &serving,
            &meal,
            date.as_deref(),
            json,
        ),
        Commands::Remove {
            entry_id,
            date,
            json,
        } => cmd_remove(&svc, &entry_id, date.as_deref(), json),
        Commands::Show { date, json } => cmd_show(&svc, date.as_deref(), json),
        Commands::Intake { json } => cmd_intake(&svc, json),
        Commands::History { days, json } => cmd_history(&svc, days, json),
        Commands::Profile { command } => match command {
            ProfileCommands::Set {
                weight,
                height,
                age,
                gender,
                activity,
                goal,
                json,
            } => {
                let args = ProfileArgs {
                    weight,
                    height,
                    age,
                    gender,
                    activity,
                    goal,
                };
                cmd_profile_set(&svc, &args, json).await
            }
            ProfileCommands::Pull { json } => cmd_profile_pull(&svc, json).await,
            ProfileCommands::Show { json } => cmd_profile_show(&svc, json),
        },
        Commands::Recommend { weight, goal, json } => cmd_recommend(weight, &goal, json),
    }
}
