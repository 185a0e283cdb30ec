//! ttsurvey CLI — run listening-test sessions and report their results.

use std::path::PathBuf;
use std::process;

use clap::{Parser, Subcommand};

mod commands;

#[derive(Parser)]
#[command(
    name = "ttsurvey",
    version,
    about = "Listening-test sessions for TTS evaluation"
)]
struct Cli {
    /// Config file path
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Store to use (a name under [stores] in the config)
    #[arg(long, global = true)]
    store: Option<String>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Create a starter config and sentence list
    Init,

    /// Validate the config and sentence list
    Validate {
        /// Check that every audio file exists on disk
        #[arg(long)]
        check_audio: bool,

        /// Print the effective study and cache settings
        #[arg(long)]
        print_config: bool,
    },

    /// Print the presentation order for a session id
    Shuffle {
        /// Session id to seed the shuffle (random if omitted)
        #[arg(long)]
        session: Option<String>,

        /// Output format: table, json
        #[arg(long, default_value = "table")]
        format: String,
    },

    /// Take the survey interactively on the terminal
    Take {
        /// Participant name
        #[arg(long)]
        name: Option<String>,

        /// Participant email
        #[arg(long)]
        email: Option<String>,

        /// Native speaker of the study language: yes, no
        #[arg(long)]
        native: Option<String>,

        /// Resume a cached session by id
        #[arg(long, conflicts_with = "resume_latest")]
        resume: Option<String>,

        /// Resume the most recently updated incomplete session
        #[arg(long)]
        resume_latest: bool,

        /// Command used to play a sample, given the audio path as its argument
        #[arg(long)]
        player: Option<String>,
    },

    /// Summarize all collected ratings
    Results {
        /// Output format: table, json, html
        #[arg(long, default_value = "table")]
        format: String,

        /// Write to this file instead of stdout
        #[arg(long)]
        output: Option<PathBuf>,
    },

    /// Comparative analysis around a reference model
    Analyze {
        /// Reference model (default: first configured model)
        #[arg(long)]
        reference: Option<String>,

        /// Sentences a participant must have rated to count (default: sentence list length)
        #[arg(long)]
        expected: Option<usize>,

        /// Output format: text, json
        #[arg(long, default_value = "text")]
        format: String,
    },

    /// Export submissions as CSV
    Export {
        /// Scheme whose records to export (default: the configured scheme)
        #[arg(long)]
        scheme: Option<String>,

        /// Write to this file instead of stdout
        #[arg(long)]
        output: Option<PathBuf>,
    },

    /// List participant comments
    Comments {
        /// Output format: text, csv
        #[arg(long, default_value = "text")]
        format: String,

        /// Write to this file instead of stdout
        #[arg(long)]
        output: Option<PathBuf>,
    },
}

#[tokio::main]
async fn main() {
    tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive("ttsurvey=info".parse().unwrap()),
        )
        .init();

    let cli = Cli::parse();
    let config = cli.config;
    let store = cli.store;

    let result = match cli.command {
        Commands::Init => commands::init::execute(),
        Commands::Validate {
            check_audio,
            print_config,
        } => commands::validate::execute(config, store, check_audio, print_config),
        Commands::Shuffle { session, format } => {
            commands::shuffle::execute(config, session, format)
        }
        Commands::Take {
            name,
            email,
            native,
            resume,
            resume_latest,
            player,
        } => {
            commands::take::execute(
                config,
                store,
                commands::take::TakeArgs {
                    name,
                    email,
                    native,
                    resume,
                    resume_latest,
                    player,
                },
            )
            .await
        }
        Commands::Results { format, output } => {
            commands::results::execute(config, store, format, output).await
        }
        Commands::Analyze {
            reference,
            expected,
            format,
        } => commands::analyze::execute(config, store, reference, expected, format).await,
        Commands::Export { scheme, output } => {
            commands::export::execute(config, store, scheme, output).await
        }
        Commands::Comments { format, output } => {
            commands::comments::execute(config, store, format, output).await
        }
    };

    if let Err(e) = result {
        eprintln!("Error: {e:#}");
        process::exit(1);
    }
}
