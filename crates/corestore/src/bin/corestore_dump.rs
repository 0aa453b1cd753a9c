//! Reference dump tool for the alert file format and the record codec it's
//! built on: reads one day of an alert file, decodes the frames, and
//! offers human-readable, CSV, and filtered re-encoded binary output.
//!
//! Filtering is by the twelve telemetry record kinds `corestore-telemetry`
//! defines (`--kind`, repeatable), with a single generic CSV schema since
//! every kind here shares one row shape.

use std::path::PathBuf;
use std::process::ExitCode;

use anyhow::{bail, Context, Result};
use chrono::NaiveDate;
use clap::{Parser, ValueEnum};
use corestore_telemetry::{AlertFile, TelemetryRecord};

#[derive(Copy, Clone, Debug, PartialEq, Eq, ValueEnum)]
enum Kind {
    Heap,
    HashTbl,
    Thread,
    Mx,
    Queue,
    Socket,
    Engine,
    Link,
    Db,
    DbHost,
    DbTable,
    App,
    Alert,
}

impl Kind {
    fn matches(self, record: &TelemetryRecord) -> bool {
        matches!(
            (self, record),
            (Kind::Heap, TelemetryRecord::Heap { .. })
                | (Kind::HashTbl, TelemetryRecord::HashTbl { .. })
                | (Kind::Thread, TelemetryRecord::Thread { .. })
                | (Kind::Mx, TelemetryRecord::Mx { .. })
                | (Kind::Queue, TelemetryRecord::Queue { .. })
                | (Kind::Socket, TelemetryRecord::Socket { .. })
                | (Kind::Engine, TelemetryRecord::Engine { .. })
                | (Kind::Link, TelemetryRecord::Link { .. })
                | (Kind::Db, TelemetryRecord::Db)
                | (Kind::DbHost, TelemetryRecord::DbHost { .. })
                | (Kind::DbTable, TelemetryRecord::DbTable { .. })
                | (Kind::App, TelemetryRecord::App { .. })
                | (Kind::Alert, TelemetryRecord::Alert { .. })
        )
    }
}

/// Dumps decoded telemetry records out of one UTC day of an alert file.
#[derive(Parser)]
#[command(author, version, about)]
struct Cli {
    /// Alert file prefix (`<prefix>_<date>` and `<prefix>_<date>.idx`)
    prefix: PathBuf,

    /// Day to dump, YYYYMMDD
    #[arg(short = 'd', long = "date")]
    date: String,

    /// Record kinds to include (repeatable); default is every kind
    #[arg(long = "kind", value_enum)]
    kinds: Vec<Kind>,

    /// First seq_no to read
    #[arg(long, default_value_t = 0)]
    since: u64,

    /// Print each decoded record to stdout
    #[arg(short = 'V', long)]
    verbose: bool,

    /// Write decoded records as CSV to this path
    #[arg(long)]
    csv: Option<PathBuf>,

    /// Write matching frames, re-encoded and checksummed, to this path
    #[arg(short = 'o', long = "out")]
    out: Option<PathBuf>,
}

fn main() -> ExitCode {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .init();

    match run(Cli::parse()) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("corestore-dump: {e:#}");
            ExitCode::FAILURE
        }
    }
}

fn run(cli: Cli) -> Result<()> {
    let date = parse_yyyymmdd(&cli.date)?;

    let mut file = AlertFile::new(&cli.prefix);
    let mut csv_writer = cli.csv.as_ref().map(csv::Writer::from_path).transpose()?;
    if let Some(w) = &mut csv_writer {
        w.write_record(["seq_no", "kind", "detail"])?;
    }
    let mut out_buf = Vec::new();

    let mut seq_no = cli.since;
    let mut dumped = 0u64;
    while let Some(frame) = file.read(date, seq_no)? {
        let record = TelemetryRecord::from_frame(&frame).with_context(|| format!("decoding seq_no {seq_no}"))?;
        let included = cli.kinds.is_empty() || cli.kinds.iter().any(|k| k.matches(&record));
        seq_no += 1;
        if !included {
            continue;
        }

        if cli.verbose {
            println!("{:>10} {:?}", dumped, record);
        }
        if let Some(w) = &mut csv_writer {
            write_csv_row(w, seq_no - 1, &record)?;
        }
        if cli.out.is_some() {
            frame.encode_checksummed(&mut out_buf);
        }
        dumped += 1;
    }

    if let Some(w) = &mut csv_writer {
        w.flush()?;
    }
    if let Some(path) = &cli.out {
        std::fs::write(path, &out_buf).with_context(|| format!("writing {}", path.display()))?;
    }

    eprintln!("corestore-dump: {dumped} record(s) from {} on {date}", cli.prefix.display());
    Ok(())
}

fn write_csv_row(w: &mut csv::Writer<std::fs::File>, seq_no: u64, record: &TelemetryRecord) -> Result<()> {
    let (kind, detail) = match record {
        TelemetryRecord::Heap { id } => ("heap", id.clone()),
        TelemetryRecord::HashTbl { id } => ("hash_tbl", id.clone()),
        TelemetryRecord::Thread { name, tid } => ("thread", format!("{name}:{tid}")),
        TelemetryRecord::Mx { id } => ("mx", id.clone()),
        TelemetryRecord::Queue { queue_type, id } => ("queue", format!("{queue_type}:{id}")),
        TelemetryRecord::Socket { id } => ("socket", id.clone()),
        TelemetryRecord::Engine { id } => ("engine", id.clone()),
        TelemetryRecord::Link { id } => ("link", id.clone()),
        TelemetryRecord::Db => ("db", String::new()),
        TelemetryRecord::DbHost { id } => ("db_host", id.clone()),
        TelemetryRecord::DbTable { id } => ("db_table", id.clone()),
        TelemetryRecord::App { updated } => ("app", updated.to_string()),
        TelemetryRecord::Alert { severity, message, .. } => ("alert", format!("{severity}:{message}")),
    };
    w.write_record([seq_no.to_string(), kind.to_string(), detail])?;
    Ok(())
}

fn parse_yyyymmdd(s: &str) -> Result<NaiveDate> {
    if s.len() != 8 || !s.bytes().all(|b| b.is_ascii_digit()) {
        bail!("date must be YYYYMMDD, got {s:?}");
    }
    let year: i32 = s[0..4].parse().context("bad year")?;
    let month: u32 = s[4..6].parse().context("bad month")?;
    let day: u32 = s[6..8].parse().context("bad day")?;
    NaiveDate::from_ymd_opt(year, month, day).ok_or_else(|| anyhow::anyhow!("invalid date {s:?}"))
}
