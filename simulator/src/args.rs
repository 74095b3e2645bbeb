use clap::Parser;
use libsql_bridge::TransactionMode;
use serde::Serialize;
use std::path::PathBuf;
use std::time::Duration;

#[derive(Parser, Debug)]
#[command(author, version, about = "Deterministic libsql-bridge simulator")]
pub(crate) struct Args {
    #[arg(long, value_parser = humantime::parse_duration)]
    pub(crate) duration: Option<Duration>,
    #[arg(long)]
    pub(crate) iterations: Option<u64>,
    #[arg(long)]
    pub(crate) seed: Option<u64>,
    /// Simulated host threads; each owns at most one connection at a time.
    #[arg(long, default_value_t = 8)]
    pub(crate) tasks: usize,
    #[arg(long, default_value_t = 0.05)]
    pub(crate) sleep_rate: f64,
    /// Chance a step tries to use another task's transaction or statement.
    #[arg(long, default_value_t = 0.05)]
    pub(crate) intrude_rate: f64,
    #[arg(long, default_value_t = 0.02)]
    pub(crate) close_rate: f64,
    #[arg(long, default_value_t = 4)]
    pub(crate) max_in_flight_tx: usize,
    #[arg(long, value_enum, default_value = "deferred")]
    pub(crate) txn_mode: TransactionMode,
    #[arg(long, default_value_t = 7)]
    pub(crate) fetch_size: usize,
    #[arg(long)]
    pub(crate) log: Option<PathBuf>,
    #[arg(long)]
    pub(crate) quick: bool,
    #[arg(long)]
    pub(crate) stress: bool,
}

#[derive(Debug, Clone, Serialize)]
pub(crate) struct SimConfig {
    pub(crate) duration_ms: Option<u64>,
    pub(crate) iterations: Option<u64>,
    pub(crate) seed: u64,
    pub(crate) tasks: usize,
    pub(crate) sleep_rate: f64,
    pub(crate) intrude_rate: f64,
    pub(crate) close_rate: f64,
    pub(crate) max_in_flight_tx: usize,
    pub(crate) txn_mode: TransactionMode,
    pub(crate) fetch_size: usize,
    pub(crate) log: Option<PathBuf>,
    pub(crate) preset: Option<String>,
    pub(crate) first_steps: usize,
    pub(crate) tail_steps: usize,
}

impl SimConfig {
    pub(crate) fn from_args(args: Args) -> Self {
        let mut config = SimConfig {
            duration_ms: args
                .duration
                .map(|d| u64::try_from(d.as_millis()).unwrap_or(u64::MAX)),
            iterations: args.iterations,
            seed: args.seed.unwrap_or_else(random_seed),
            tasks: args.tasks.max(1),
            sleep_rate: clamp_rate(args.sleep_rate),
            intrude_rate: clamp_rate(args.intrude_rate),
            close_rate: clamp_rate(args.close_rate),
            max_in_flight_tx: args.max_in_flight_tx.max(1),
            txn_mode: args.txn_mode,
            fetch_size: args.fetch_size.max(1),
            log: args.log,
            preset: None,
            first_steps: 30,
            tail_steps: 80,
        };
        if config.iterations.is_none() && config.duration_ms.is_none() {
            config.iterations = Some(2_000);
        }

        if args.quick {
            config.apply_quick();
        }
        if args.stress {
            config.apply_stress();
        }

        config
    }

    fn apply_quick(&mut self) {
        self.preset = Some("quick".to_string());
        self.iterations = Some(2_000);
        self.duration_ms = None;
        self.tasks = 4;
        self.intrude_rate = 0.05;
        self.close_rate = 0.02;
        self.max_in_flight_tx = 2;
    }

    fn apply_stress(&mut self) {
        self.preset = Some("stress".to_string());
        self.iterations = Some(50_000);
        self.duration_ms = None;
        self.tasks = 32;
        self.intrude_rate = 0.1;
        self.close_rate = 0.05;
        self.max_in_flight_tx = 16;
        self.fetch_size = 3;
    }
}

fn clamp_rate(value: f64) -> f64 {
    if value.is_nan() { 0.0 } else { value.clamp(0.0, 1.0) }
}

fn random_seed() -> u64 {
    use std::time::{SystemTime, UNIX_EPOCH};
    let now = SystemTime::now().duration_since(UNIX_EPOCH).unwrap_or_default();
    now.as_secs() ^ u64::from(now.subsec_nanos())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn clamp_rate_limits_bounds() {
        assert_eq!(clamp_rate(-1.0), 0.0);
        assert_eq!(clamp_rate(2.0), 1.0);
        assert_eq!(clamp_rate(0.5), 0.5);
        assert_eq!(clamp_rate(f64::NAN), 0.0);
    }

    #[test]
    fn runs_are_bounded_by_default() {
        let config = SimConfig::from_args(Args::parse_from(["sim", "--seed", "7"]));
        assert_eq!(config.seed, 7);
        assert_eq!(config.iterations, Some(2_000));
        assert_eq!(config.txn_mode, TransactionMode::Deferred);

        let config = SimConfig::from_args(Args::parse_from(["sim", "--txn-mode", "immediate"]));
        assert_eq!(config.txn_mode, TransactionMode::Immediate);
    }
}
