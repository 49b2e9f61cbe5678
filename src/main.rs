extern crate env_logger;

use vhs::flow::{InputFormat, InputStream, OutputFormat};
use vhs::jsonx::{BufferedJsonOutputFormat, JsonInputFormat, JsonOutputFormat};
use vhs::pipe::{fan_out, Pipe};
use vhs::registry::Registry;
use vhs::sink;
use vhs::Context;

use std::fs;
use std::io;
use std::process;
use std::sync::Arc;
use std::thread;
use std::time::Duration;

use clap::Parser;
use crossbeam::{channel, select};
use signal_hook::consts::signal;
use signal_hook::iterator::Signals;

// THREADS
//
// The main thread sets everything up and then waits for a signal or the time limit.  The input
// format, every pipe, the relay between them, and the error logger each get a thread.  When the
// main thread cancels the run they all wind down, and the main thread joins them before flushing
// the sinks.

#[derive(Parser)]
#[command(author, version, about = "Relay newline-delimited JSON records to one or more outputs", long_about = None)]
struct Cli {
    /// Input file, one stream per file, "-" for stdin (repeatable)
    #[arg(long, default_values_t = vec!["-".to_string()])]
    input: Vec<String>,

    /// Output file, appended to, "-" for stdout (repeatable)
    #[arg(long, default_values_t = vec!["-".to_string()])]
    output: Vec<String>,

    /// Write all records as one JSON array when the run ends instead of one line per record
    #[arg(long, default_value_t = false)]
    buffered: bool,

    /// Stop after this many seconds [default: run until interrupted]
    #[arg(long)]
    time_limit: Option<u64>,

    /// Debug logging
    #[arg(long, default_value_t = false)]
    verbose: bool,
}

fn main() {
    let cli = Cli::parse();

    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(if cli.verbose {
        "debug"
    } else {
        "warn"
    }))
    .init();

    if let Err(msg) = run(&cli) {
        log::error!("{msg}");
        process::exit(1);
    }
}

fn open_input(name: &str) -> Result<InputStream, String> {
    if name == "-" {
        Ok(InputStream::from_reader("stdin", io::stdin()))
    } else {
        let f = fs::File::open(name).map_err(|e| format!("Can't open {name}: {e}"))?;
        Ok(InputStream::from_reader(name, f))
    }
}

fn run(cli: &Cli) -> Result<(), String> {
    // Open everything before starting anything, so that a bad file name fails the run cleanly.
    let inputs = cli
        .input
        .iter()
        .map(|name| open_input(name))
        .collect::<Result<Vec<_>, String>>()?;

    let mut signals = Signals::new([signal::SIGINT, signal::SIGTERM, signal::SIGHUP])
        .map_err(|_| "Signal handling setup".to_string())?;
    let signal_handle = signals.handle();
    let (signal_sender, signal_receiver) = channel::unbounded();
    thread::spawn(move || {
        for s in signals.forever() {
            let _ = signal_sender.send(s);
        }
    });

    let (ctx, canceller, errors) = Context::new(Registry::default());

    // Errors are logged as they come in while the run lasts; whatever is reported during shutdown
    // is drained below.  Undecodable input is counted for the summary at exit.
    let error_logger = {
        let ctx = ctx.clone();
        let errors = errors.clone();
        thread::spawn(move || {
            let mut bad_records = 0;
            loop {
                select! {
                    recv(errors) -> msg => match msg {
                        Ok(e) => {
                            if e.is_decode() {
                                bad_records += 1;
                            }
                            log::error!("{e}");
                        }
                        Err(_) => return bad_records,
                    },
                    recv(ctx.done()) -> _ => return bad_records,
                }
            }
        })
    };

    let mut pipe_threads = vec![];
    let mut writers = vec![];
    for name in &cli.output {
        let format: Arc<dyn OutputFormat> = if cli.buffered {
            Arc::new(BufferedJsonOutputFormat::new())
        } else {
            Arc::new(JsonOutputFormat::new())
        };
        let mut pipe = Pipe::new(format, sink::from_path(name));
        writers.push(pipe.writer());
        let ctx = ctx.clone();
        let name = name.clone();
        pipe_threads.push(thread::spawn(move || {
            pipe.init(ctx);
            (name, pipe)
        }));
    }

    let input_format = Arc::new(JsonInputFormat::new());
    let records = input_format.output();
    let (streams, stream_receiver) = channel::unbounded();
    let input_thread = {
        let ctx = ctx.clone();
        let input_format = Arc::clone(&input_format);
        thread::spawn(move || {
            input_format.init(ctx, None, stream_receiver);
        })
    };

    let relay_thread = {
        let ctx = ctx.clone();
        thread::spawn(move || {
            fan_out(&ctx, records, &writers);
        })
    };

    for stream in inputs {
        let _ = streams.send(stream);
    }

    log::debug!("Initialization succeeded");

    let cutoff = if let Some(limit) = cli.time_limit {
        channel::after(Duration::from_secs(limit))
    } else {
        channel::never()
    };
    select! {
        recv(cutoff) -> _ => {
            log::debug!("Time limit reached");
        }
        recv(signal_receiver) -> s => {
            log::debug!("Received signal {s:?}");
        }
    }

    canceller.cancel();
    drop(streams);

    let _ = input_thread.join();
    let _ = relay_thread.join();
    let mut failed = false;
    for h in pipe_threads {
        let (name, mut pipe) = h.join().map_err(|_| "Pipe thread panicked".to_string())?;
        if let Err(e) = pipe.flush() {
            log::error!("{name}: {e}");
            failed = true;
        }
        for e in pipe.errors() {
            log::error!("{name}: {e}");
            failed = true;
        }
    }

    // Decode threads blocked on input (stdin, typically) may never return; they are not waited
    // for.
    let mut bad_records = error_logger.join().unwrap_or(0);
    for e in errors.try_iter() {
        if e.is_decode() {
            bad_records += 1;
        }
        log::error!("{e}");
    }
    if bad_records > 0 {
        log::warn!("{bad_records} input records could not be decoded");
    }
    signal_handle.close();

    if failed {
        Err("Output incomplete".to_string())
    } else {
        Ok(())
    }
}
