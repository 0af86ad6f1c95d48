//! Fix simulator - writes a synthetic JSONL fix track for replay
//!
//! The track has four phases around a zone center: dwelling at home,
//! walking out, wandering outside, and walking back.
//!
//! Usage:
//!   cargo run --bin fix-sim -- --outside-mins 45 --output fixes.jsonl
//!   cargo run --bin safezone-monitor -- --fixes fixes.jsonl

use anyhow::Context;
use chrono::{DateTime, TimeDelta, Utc};
use clap::Parser;
use safezone_monitor::domain::Fix;
use std::fs::File;
use std::io::{self, BufWriter, Write};

const METERS_PER_DEGREE: f64 = 111_195.0;

#[derive(Parser, Debug)]
#[command(name = "fix-sim")]
#[command(about = "Generate a synthetic location track as JSON lines")]
struct Args {
    /// Zone center latitude
    #[arg(long, default_value = "51.5007")]
    lat: f64,

    /// Zone center longitude
    #[arg(long, default_value = "-0.1246")]
    lon: f64,

    /// Zone radius in meters
    #[arg(long, default_value = "150")]
    radius_m: f64,

    /// Seconds between fixes
    #[arg(long, default_value = "60")]
    interval_secs: i64,

    /// Minutes spent at home before leaving
    #[arg(long, default_value = "10")]
    home_mins: i64,

    /// Minutes spent wandering outside the zone
    #[arg(long, default_value = "40")]
    outside_mins: i64,

    /// Start timestamp (RFC 3339), defaults to now
    #[arg(long)]
    start: Option<DateTime<Utc>>,

    /// Position jitter in meters
    #[arg(long, default_value = "10")]
    jitter_m: f64,

    /// Jitter seed
    #[arg(long, default_value = "7")]
    seed: u64,

    /// Output file (stdout if omitted)
    #[arg(short, long)]
    output: Option<String>,
}

/// xorshift64, enough for jitter
struct Jitter(u64);

impl Jitter {
    fn next_unit(&mut self) -> f64 {
        let mut x = self.0;
        x ^= x << 13;
        x ^= x >> 7;
        x ^= x << 17;
        self.0 = x;
        (x >> 11) as f64 / (1u64 << 53) as f64 * 2.0 - 1.0
    }
}

struct Track {
    lat: f64,
    lon: f64,
    interval: TimeDelta,
    jitter_m: f64,
    jitter: Jitter,
    now: DateTime<Utc>,
    fixes: Vec<Fix>,
}

impl Track {
    /// Record a fix `north_m`/`east_m` meters from the center, then advance the clock
    fn push(&mut self, north_m: f64, east_m: f64) {
        let north_m = north_m + self.jitter.next_unit() * self.jitter_m;
        let east_m = east_m + self.jitter.next_unit() * self.jitter_m;
        let lat = self.lat + north_m / METERS_PER_DEGREE;
        let lon = self.lon + east_m / (METERS_PER_DEGREE * self.lat.to_radians().cos());
        let accuracy = 5.0 + self.jitter.next_unit().abs() * 15.0;
        self.fixes.push(Fix::new(lat, lon, self.now).with_accuracy(accuracy.round()));
        self.now += self.interval;
    }
}

fn steps(mins: i64, interval: TimeDelta) -> i64 {
    (TimeDelta::minutes(mins).num_seconds() / interval.num_seconds()).max(1)
}

fn build_track(args: &Args) -> Vec<Fix> {
    let interval = TimeDelta::seconds(args.interval_secs.max(1));
    let mut track = Track {
        lat: args.lat,
        lon: args.lon,
        interval,
        jitter_m: args.jitter_m,
        jitter: Jitter(args.seed.max(1)),
        now: args.start.unwrap_or_else(Utc::now),
        fixes: Vec::new(),
    };

    let home = args.radius_m * 0.3;
    let far = args.radius_m * 3.0;
    let walk = 5;

    for _ in 0..steps(args.home_mins, interval) {
        track.push(home, 0.0);
    }
    for i in 1..=walk {
        track.push(home + (far - home) * i as f64 / walk as f64, 0.0);
    }
    let outside = steps(args.outside_mins, interval);
    for i in 0..outside {
        // Drift around a circle well outside the zone
        let angle = i as f64 / outside as f64 * std::f64::consts::PI;
        track.push(far * angle.cos(), far * angle.sin());
    }
    for i in 1..=walk {
        track.push(-far + (far - home) * i as f64 / walk as f64, 0.0);
    }
    track.push(0.0, 0.0);

    track.fixes
}

fn main() -> anyhow::Result<()> {
    let args = Args::parse();
    let fixes = build_track(&args);

    let mut out: Box<dyn Write> = match &args.output {
        Some(path) => Box::new(BufWriter::new(
            File::create(path).with_context(|| format!("Failed to create {path}"))?,
        )),
        None => Box::new(BufWriter::new(io::stdout().lock())),
    };

    for fix in &fixes {
        serde_json::to_writer(&mut out, fix)?;
        writeln!(out)?;
    }
    out.flush()?;

    if let Some(path) = &args.output {
        eprintln!("wrote {} fixes to {path}", fixes.len());
    }
    Ok(())
}
