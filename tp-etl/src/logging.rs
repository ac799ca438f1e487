//! env_logger setup
//!
//! Log lines go to stderr and, for ETL runs, are also appended to the
//! workspace run log so every session leaves a trail next to its exports.

use std::fs::OpenOptions;
use std::io::{self, Write};
use std::path::Path;

use anyhow::{Context, Result};
use env_logger::{Builder, Env, Target, WriteStyle};
use log::LevelFilter;

/// Writes everything to two sinks
pub struct Tee<A, B> {
    first: A,
    second: B,
}

impl<A: Write, B: Write> Tee<A, B> {
    pub fn new(first: A, second: B) -> Self {
        Tee { first, second }
    }
}

impl<A: Write, B: Write> Write for Tee<A, B> {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.first.write_all(buf)?;
        self.second.write_all(buf)?;
        Ok(buf.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        self.first.flush()?;
        self.second.flush()
    }
}

/// Install the global logger. `RUST_LOG` sets the filter (default `info`);
/// `verbose` forces debug.
pub fn init(log_file: Option<&Path>, verbose: bool) -> Result<()> {
    let mut builder = Builder::from_env(Env::default().default_filter_or("info"));

    if verbose {
        builder.filter_level(LevelFilter::Debug);
    }
    // sqlx logs every statement at debug
    builder.filter_module("sqlx", LevelFilter::Warn);

    builder.format(|buf, record| {
        writeln!(
            buf,
            "{} [{}] {}",
            chrono::Local::now().format("%Y-%m-%d %H:%M:%S"),
            record.level(),
            record.args()
        )
    });

    if let Some(path) = log_file {
        let file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(path)
            .with_context(|| format!("Failed to open log file: {}", path.display()))?;

        builder
            .target(Target::Pipe(Box::new(Tee::new(io::stderr(), file))))
            .write_style(WriteStyle::Never);
    }

    builder
        .try_init()
        .context("Failed to initialise logging")?;
    Ok(())
}
