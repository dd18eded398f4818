use clap::{Parser, Subcommand};
use std::path::PathBuf;
use wav2midi::{validate_input, Config, Wav2Midi};

/// Spectral audio-to-MIDI transcription
#[derive(Parser)]
#[command(name = "wav2midi")]
#[command(about = "Transcribe a WAV recording into a MIDI note stream")]
#[command(version = env!("CARGO_PKG_VERSION"))]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Analyze audio file and generate MIDI output
    Analyze {
        /// Input audio file (WAV)
        input: PathBuf,

        /// Output directory for results
        #[arg(short, long, default_value = "./output")]
        output: PathBuf,

        /// Custom configuration file (JSON)
        #[arg(short, long)]
        config: Option<PathBuf>,

        /// Override the analysis frame length in samples
        #[arg(long)]
        frame_length: Option<usize>,

        /// Override the overlap factor (hop = frame length / overlap)
        #[arg(long)]
        overlap: Option<usize>,

        /// Verbose output
        #[arg(short, long)]
        verbose: bool,

        /// Quiet output
        #[arg(short, long)]
        quiet: bool,
    },
    /// Validate configuration file
    ValidateConfig {
        /// Configuration file to validate
        config: PathBuf,
    },
    /// Show default configuration
    ShowConfig,
}

fn init_logging(verbose: bool, quiet: bool) {
    let level = if verbose {
        "debug"
    } else if quiet {
        "warn"
    } else {
        "info"
    };
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(level))
        .format_timestamp_millis()
        .init();
}

fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    match cli.command {
        Commands::Analyze {
            input,
            output,
            config,
            frame_length,
            overlap,
            verbose,
            quiet,
        } => {
            if verbose && quiet {
                anyhow::bail!("Cannot specify both --verbose and --quiet");
            }
            init_logging(verbose, quiet);

            // Load configuration
            let mut config = if let Some(config_path) = config {
                wav2midi::config::load_config(config_path)?
            } else {
                Config::default()
            };
            if let Some(frame_length) = frame_length {
                config.frame.frame_length = frame_length;
            }
            if let Some(overlap) = overlap {
                config.frame.overlap = overlap;
            }

            validate_input(&input, &config)?;
            let processor = Wav2Midi::new(config)?;

            if !quiet {
                println!("Processing {}...", input.display());
            }

            let state = processor.process(&input, &output)?;

            if !quiet {
                println!(
                    "{} note events from {} frames saved to {}",
                    state.note_events.len(),
                    state.frame_count(),
                    output.display()
                );
            }
        }
        Commands::ValidateConfig { config } => {
            let config = wav2midi::config::load_config(config)?;
            println!("Configuration is valid");
            println!("{}", serde_json::to_string_pretty(&config)?);
        }
        Commands::ShowConfig => {
            let config = Config::default();
            println!("{}", serde_json::to_string_pretty(&config)?);
        }
    }

    Ok(())
}
