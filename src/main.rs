//! fileway-ul - send a file, a ZIP bundle or a short text through a Fileway relay
//!
//! Flow:
//! - validate arguments (no network yet)
//! - resolve the secret (env, ~/.fileway-creds, prompt)
//! - optionally zip the inputs into a temporary archive
//! - setup, wait for a downloader, upload chunk by chunk

use anyhow::{Context, Result};
use clap::Parser;
use std::io::IsTerminal;
use std::sync::Arc;

use fileway_ul::cleanup::{install_interrupt_handler, CleanupRegistry};
use fileway_ul::cli::{Args, SendMode};
use fileway_ul::config::Config;
use fileway_ul::credentials::{CredentialSources, CredentialStore, SecretOrigin};
use fileway_ul::logger::{Logger, NoopLogger, TextLogger};
use fileway_ul::packager::{pack, TempArchive};
use fileway_ul::progress::{BarReporter, LineReporter, NoopReporter, ProgressReporter};
use fileway_ul::prompt::TerminalPrompt;
use fileway_ul::relay::HttpTransport;
use fileway_ul::url::BaseUrl;
use fileway_ul::{ChunkPlan, Error, Payload, PayloadMeta, PollPolicy, Session, TransferClient};

fn main() {
    let args = Args::parse();

    // Temporary archives are registered here so Ctrl-C can remove them too
    let registry = CleanupRegistry::new();
    if let Err(e) = install_interrupt_handler(registry.clone()) {
        eprintln!("Warning: could not install Ctrl-C handler: {}", e);
    }

    let code = match run(&args, &registry) {
        Ok(()) => 0,
        Err(e) => report_error(&e),
    };
    std::process::exit(code);
}

fn run(args: &Args, registry: &CleanupRegistry) -> Result<()> {
    println!("== Fileway {} ==", env!("CARGO_PKG_VERSION"));
    println!();

    let mode = args.mode()?;

    let config = Config::load(args.url.as_deref())?;
    let base_url = config.base_url()?;
    if args.verbose {
        println!("Relay: {}", base_url);
    }

    let store = CredentialStore::new(CredentialStore::default_path());
    let resolved = store.resolve(&CredentialSources::from_env(), &TerminalPrompt, args.save)?;
    match resolved.origin {
        SecretOrigin::Prompt { saved: true } => {
            println!("Secret saved to {}", store.path().display());
            println!();
        }
        SecretOrigin::Prompt { saved: false } => {
            println!("Use '--save' to save the secret to user home and avoid the prompt");
        }
        _ => {}
    }

    // Choose logger once; NoopLogger when no --log-file
    let logger: Arc<dyn Logger> = match &args.log_file {
        Some(p) => match TextLogger::new(p) {
            Ok(l) => Arc::new(l),
            Err(e) => {
                eprintln!("Warning: cannot open log file {}: {}", p.display(), e);
                Arc::new(NoopLogger)
            }
        },
        None => Arc::new(NoopLogger),
    };

    // The archive must outlive the upload; dropping it deletes the file
    let (payload, _archive): (Payload, Option<TempArchive>) = match mode {
        SendMode::Text(text) => {
            println!("Sending secret text...");
            (Payload::Text(text), None)
        }
        SendMode::File(path) => {
            println!("Uploading '{}'...", path.display());
            (Payload::File(path), None)
        }
        SendMode::Zip(paths) => {
            println!("Zipping files...");
            let archive = pack(&paths, registry)?;
            println!("Created upload file '{}'", archive.path().display());
            if args.verbose {
                for member in archive.members() {
                    println!("  + {}", member);
                }
            }
            println!("Uploading '{}'...", archive.path().display());
            (Payload::File(archive.path().to_path_buf()), Some(archive))
        }
    };

    let transport = HttpTransport::with_timeout(base_url.clone(), config.request_timeout())
        .context("Failed to set up the HTTP client")?;
    let mut client = TransferClient::new(transport, resolved.secret)
        .with_poll_policy(PollPolicy::unbounded(config.poll_interval()))
        .with_logger(logger);

    let reporter: Box<dyn ProgressReporter> = if args.quiet {
        Box::new(NoopReporter)
    } else if std::io::stdout().is_terminal() {
        Box::new(BarReporter::new(0))
    } else {
        Box::new(LineReporter)
    };

    let meta = payload.meta()?;
    if args.verbose {
        println!("{}", payload_summary(&meta));
    }
    let session = client.begin_session(&meta)?;
    print_download_hints(&base_url, &session);
    if args.verbose {
        println!("Waiting for a downloader to connect...");
    }

    let plan = client.await_chunk_plan(&session)?;
    if args.verbose {
        println!("{}", plan_summary(&plan));
    }
    let source = payload
        .open()
        .context("Failed to open the payload for reading")?;
    client.upload(&session, &plan, source, reporter.as_ref())?;

    println!("All data sent. Bye!");
    Ok(())
}

fn payload_summary(meta: &PayloadMeta) -> String {
    match &meta.filename {
        Some(name) => format!("Payload: '{}', {} bytes", name, meta.size),
        None => format!("Payload: text, {} bytes", meta.size),
    }
}

fn plan_summary(plan: &ChunkPlan) -> String {
    format!(
        "Downloader connected: {} chunk(s), {} bytes planned",
        plan.len(),
        plan.total()
    )
}

fn print_download_hints(base_url: &BaseUrl, session: &Session) {
    let url = base_url.download_url(session.conduit_id());
    if session.is_text() {
        println!("All set up! Download your text using:");
        println!("- a browser, from {}", url);
        println!("- a shell, with $> curl {}", url);
    } else {
        println!("All set up! Download your file using:");
        println!("- a browser, from {}", url);
        println!("- a shell, with $> curl -OJ {}", url);
    }
}

/// Print the failure and pick the exit status (130 for Ctrl-C, 1 otherwise)
fn report_error(e: &anyhow::Error) -> i32 {
    match e.downcast_ref::<Error>() {
        Some(Error::Interrupted) => {
            eprintln!("Interrupted");
        }
        Some(Error::Validation(msg)) => {
            eprintln!("{}", msg);
        }
        Some(err @ Error::SessionExpired) => {
            eprintln!("ERROR: {}.", err);
        }
        _ => {
            eprintln!("ERROR: {:#}", e);
        }
    }
    e.downcast_ref::<Error>().map(Error::exit_code).unwrap_or(1)
}
