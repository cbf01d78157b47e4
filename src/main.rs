//! dfreader main entry point
//!
//! `read` mode runs an event loop over two sources:
//! 1. stdin (line commands: stop, resume, jump, rate, bookmark, quit)
//! 2. the read-aloud sequencer (engine completions and inter-chunk pauses)
//!
//! `library` mode prints the filtered catalog and exits.

use anyhow::Context;
use dfreader::input::{self, NonBlockingInput};
use dfreader::library::{self, LibraryQuery};
use dfreader::state::config::Config;
use dfreader::state::State;
use log::{debug, error, info};
use mio::{Events, Interest, Poll, Token};
use nix::libc;
use nix::sys::signal::{self, SigHandler, Signal};
use std::io::{self, Write};
use std::os::unix::io::AsRawFd;
use std::process;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::{Duration, Instant};

/// Token for stdin in mio poll
const STDIN: Token = Token(0);

/// Upper bound on poll sleep, so engine completions are noticed promptly
const MAX_POLL_WAIT: Duration = Duration::from_millis(50);

/// Rate change per +/- command
const RATE_STEP: f32 = 0.1;

/// Global flag set by SIGINT handler
static INTERRUPTED: AtomicBool = AtomicBool::new(false);

extern "C" fn handle_sigint(_: libc::c_int) {
    INTERRUPTED.store(true, Ordering::Relaxed);
}

const USAGE: &str = "\
Usage:
  dfreader [--debug] [--config FILE] read <file.txt|file.epub>
  dfreader [--debug] [--config FILE] library [--search TERM] [--genre GENRE] [--sort title|author|download] [CATALOG]";

const HELP: &str = "\
Commands: r = read from bookmark, g N = read from token N, s = stop,
          + / - = faster / slower, b = bookmark here, ? = status, q = quit";

/// Parsed command line
#[derive(Debug, Default)]
struct Args {
    debug: bool,
    config: Option<String>,
    command: Vec<String>,
}

fn parse_args() -> Args {
    let mut args = Args::default();
    let mut iter = std::env::args().skip(1);
    while let Some(arg) = iter.next() {
        match arg.as_str() {
            "--debug" | "-d" => args.debug = true,
            "--config" | "-c" => args.config = iter.next(),
            _ => args.command.push(arg),
        }
    }
    args
}

fn init_logging(debug_mode: bool) {
    if debug_mode {
        // Debug mode: write to dfreader.log so the terminal stays clean
        use std::fs::OpenOptions;
        match OpenOptions::new()
            .create(true)
            .append(true)
            .open("dfreader.log")
        {
            Ok(log_file) => {
                env_logger::Builder::new()
                    .filter_level(log::LevelFilter::Debug)
                    .target(env_logger::Target::Pipe(Box::new(log_file)))
                    .init();
            }
            Err(e) => {
                eprintln!("Warning: Failed to open dfreader.log for debug logging: {}", e);
                env_logger::Builder::new()
                    .filter_level(log::LevelFilter::Warn)
                    .init();
            }
        }

        info!(
            "{} version {} starting (debug mode, logging to dfreader.log)",
            dfreader::APP_NAME,
            dfreader::VERSION
        );
    } else {
        env_logger::Builder::new()
            .filter_level(log::LevelFilter::Error)
            .parse_default_env()
            .init();
    }
}

fn main() {
    let args = parse_args();
    init_logging(args.debug);

    if let Err(e) = run(args) {
        error!("Fatal error: {:#}", e);
        eprintln!("Error: {:#}", e);
        process::exit(1);
    }
}

fn run(args: Args) -> anyhow::Result<()> {
    let config = match &args.config {
        Some(path) => Config::load_from(path),
        None => Config::load(),
    }
    .context("loading configuration")?;

    let mut command = args.command.into_iter();
    match command.next().as_deref() {
        Some("read") => {
            let file = command.next().context(USAGE)?;
            run_reader(config, &file)
        }
        Some("library") => run_library(&config, command.collect()),
        _ => {
            eprintln!("{}", USAGE);
            process::exit(2);
        }
    }
}

fn run_library(config: &Config, rest: Vec<String>) -> anyhow::Result<()> {
    let mut query = LibraryQuery {
        sort: config.default_sort(),
        ..Default::default()
    };
    let mut catalog_path = config.catalog_path();

    let mut iter = rest.into_iter();
    while let Some(arg) = iter.next() {
        match arg.as_str() {
            "--search" => query.term = iter.next().unwrap_or_default(),
            "--genre" => query.genre = iter.next().unwrap_or_default(),
            "--sort" => {
                let key = iter.next().unwrap_or_default();
                query.sort = key.parse()?;
            }
            _ => catalog_path = arg.into(),
        }
    }

    let catalog = library::load_catalog(&catalog_path)
        .with_context(|| format!("catalog {} not available", catalog_path.display()))?;
    let books = library::filter_and_sort(&catalog.books, &query);

    println!("{}", library::status_line(books.len()));
    for book in &books {
        println!("\n{}", library::render_entry(book));
    }
    Ok(())
}

fn run_reader(config: Config, file: &str) -> anyhow::Result<()> {
    let mut state = State::new(config)?;
    state
        .open(file)
        .with_context(|| format!("opening {}", file))?;

    unsafe {
        signal::signal(Signal::SIGINT, SigHandler::Handler(handle_sigint))
            .context("installing SIGINT handler")?;
    }

    let stdin_fd = io::stdin().as_raw_fd();
    let stdin = NonBlockingInput::new(stdin_fd).context("configuring stdin")?;
    let mut poll = Poll::new()?;
    let mut stdin_source = mio::unix::SourceFd(&stdin_fd);
    poll.registry()
        .register(&mut stdin_source, STDIN, Interest::READABLE)?;
    let mut events = Events::with_capacity(16);

    if !state.sequencer().is_supported() {
        println!("No speech engine available; read-aloud is disabled.");
    }
    println!("{}", state.status());
    println!("{}", HELP);

    state.read_aloud();
    info!("Entering event loop");

    let mut pending_input: Vec<u8> = Vec::new();
    loop {
        if INTERRUPTED.swap(false, Ordering::Relaxed) {
            info!("Interrupted, stopping");
            state.stop_reading();
            return Ok(());
        }

        let now = Instant::now();
        state.pump(now);

        let timeout = state
            .time_until_next(now)
            .map_or(MAX_POLL_WAIT, |d| d.min(MAX_POLL_WAIT));

        match poll.poll(&mut events, Some(timeout)) {
            Ok(()) => {}
            Err(e) if e.kind() == io::ErrorKind::Interrupted => {
                debug!("poll interrupted by signal");
                continue;
            }
            Err(e) => return Err(e.into()),
        }

        for event in events.iter() {
            if event.token() != STDIN {
                continue;
            }
            let open = stdin.drain_into(&mut pending_input)?;

            for line in input::take_lines(&mut pending_input) {
                if !handle_command(&mut state, &line) {
                    state.stop_reading();
                    return Ok(());
                }
            }

            if !open {
                info!("stdin closed");
                state.stop_reading();
                return Ok(());
            }
        }
    }
}

/// Apply one stdin command; false means quit
fn handle_command(state: &mut State, line: &str) -> bool {
    let mut parts = line.split_whitespace();
    let Some(cmd) = parts.next() else {
        return true;
    };
    debug!("Command: {}", line);

    match cmd {
        "q" | "quit" => return false,
        "s" | "stop" => state.stop_reading(),
        "r" | "read" => state.read_aloud(),
        "g" | "goto" => match parts.next().and_then(|n| n.parse::<usize>().ok()) {
            Some(offset) => state.read_from(offset),
            None => println!("Usage: g <token offset>"),
        },
        "+" => println!("Rate {:.1} from next chunk", state.adjust_rate(RATE_STEP)),
        "-" => println!("Rate {:.1} from next chunk", state.adjust_rate(-RATE_STEP)),
        "b" | "bookmark" => match state.bookmark_here() {
            Some(offset) => println!("Bookmarked token {}", offset),
            None => println!("Nothing is being read"),
        },
        "?" | "status" => println!("{}", state.status()),
        _ => println!("{}", HELP),
    }
    let _ = io::stdout().flush();
    true
}
