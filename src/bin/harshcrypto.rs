//! harshcrypto CLI - in-place file and directory encryption
//!
//! Encrypts or decrypts a file, or every allowed file under a directory,
//! with a symmetric key kept in a key store file.

use clap::{ArgAction, Args, Parser, Subcommand};
use std::path::{Path, PathBuf};
use std::process;
use tracing_subscriber::{EnvFilter, layer::SubscriberExt, util::SubscriberInitExt};

use harshcrypto::config::Config;
use harshcrypto::error::{ErrorCategory, ErrorKind, HarshCryptoError, Result};
use harshcrypto::interrupt;
use harshcrypto::key::{DEFAULT_KEY_FILE, KeyStore};
use harshcrypto::spinner::SpinnerGuard;
use harshcrypto::stream::{DEFAULT_CHUNK_SIZE, Mode, StreamCipher};
use harshcrypto::walk;

#[derive(Parser)]
#[command(name = "harshcrypto")]
#[command(version)]
#[command(about = "Encrypt or decrypt files in place with a symmetric key.", long_about = None)]
struct Cli {
    /// Path to the key store file
    #[arg(
        long,
        global = true,
        env = "HARSHCRYPTO_KEY_FILE",
        default_value = DEFAULT_KEY_FILE,
        value_name = "FILE"
    )]
    key_file: PathBuf,

    /// Log more detail to stderr (-v for info, -vv for debug)
    #[arg(short, long, global = true, action = ArgAction::Count)]
    verbose: u8,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Generate a new key and write it to the key store
    #[command(alias = "generate_key")]
    GenerateKey {
        /// Replace an existing key store. Data encrypted under the old key
        /// can no longer be decrypted.
        #[arg(long)]
        force: bool,
    },

    /// Encrypt a file, or all allowed files under a directory, in place
    #[command(alias = "e")]
    Encrypt(TransformArgs),

    /// Decrypt a file, or all allowed files under a directory, in place
    #[command(alias = "d")]
    Decrypt(TransformArgs),
}

#[derive(Args)]
struct TransformArgs {
    /// File or directory to process
    #[arg(value_name = "PATH")]
    path: PathBuf,

    /// Chunk size in bytes
    #[arg(long, env = "HARSHCRYPTO_CHUNK_SIZE", default_value_t = DEFAULT_CHUNK_SIZE, value_name = "BYTES")]
    chunk_size: usize,

    /// File extension to process in directory mode (repeatable; defaults to txt, pdf, jpg, png)
    #[arg(long = "ext", value_name = "EXT")]
    extensions: Vec<String>,

    /// Do not show a spinner
    #[arg(long)]
    no_progress: bool,
}

enum Outcome {
    Completed,
    Cancelled,
}

fn main() {
    let cli = Cli::parse();
    init_tracing(cli.verbose);

    let code = match run(cli) {
        Ok(Outcome::Completed) => 0,
        Ok(Outcome::Cancelled) => {
            eprintln!("Operation canceled by the user.");
            0
        }
        Err(e) => {
            eprintln!("Error: {}", e.chain_message());
            1
        }
    };
    process::exit(code);
}

fn init_tracing(verbose: u8) {
    // RUST_LOG wins; otherwise only warnings unless -v was given.
    let default_level = match verbose {
        0 => "warn",
        1 => "info",
        _ => "debug",
    };
    let env_filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));
    let fmt_layer = tracing_subscriber::fmt::layer()
        .with_target(false)
        .with_writer(std::io::stderr);
    tracing_subscriber::registry()
        .with(env_filter)
        .with(fmt_layer)
        .init();
}

fn run(cli: Cli) -> Result<Outcome> {
    match cli.command {
        Commands::GenerateKey { force } => {
            let store = KeyStore::new(&cli.key_file);
            store.generate(force)?;
            println!("Key generated: {}", store.path().display());
            Ok(Outcome::Completed)
        }
        Commands::Encrypt(args) => run_transform(Mode::Encrypt, cli.key_file, args),
        Commands::Decrypt(args) => run_transform(Mode::Decrypt, cli.key_file, args),
    }
}

fn run_transform(mode: Mode, key_file: PathBuf, args: TransformArgs) -> Result<Outcome> {
    let config = Config {
        key_file,
        chunk_size: args.chunk_size,
        extensions: args.extensions,
        show_progress: !args.no_progress,
    }
    .validate()?;

    // Preconditions: both must hold before any file is touched.
    let key = config.key_store().load()?;
    let path = args.path.as_path();
    if !path.exists() {
        return Err(HarshCryptoError::with_kind(
            ErrorCategory::User,
            ErrorKind::PathNotFound,
            format!("path not found: {}", path.display()),
        ));
    }

    let cancel = interrupt::install_handler()?;
    let cipher = StreamCipher::new(&key)
        .with_chunk_size(config.chunk_size)?
        .with_cancel_flag(cancel);

    let report = {
        let _spinner = SpinnerGuard::start(mode.progressive(), config.show_progress);
        walk::process_path(&cipher, path, mode, &config.extension_filter())
    }?;

    for failure in &report.failures {
        eprintln!(
            "Error processing {}: {}",
            failure.path.display(),
            failure.error.chain_message()
        );
    }
    if report.cancelled {
        return Ok(Outcome::Cancelled);
    }

    // Per-file failures in a directory were reported above; the batch
    // itself still completed.
    println!("{} completed for {}: {}", mode.noun(), kind_of(path), path.display());
    Ok(Outcome::Completed)
}

fn kind_of(path: &Path) -> &'static str {
    if path.is_dir() { "directory" } else { "file" }
}
