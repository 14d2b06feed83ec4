//! bodytrend - Personal body-metrics tracker

use anyhow::{Context, Result, ensure};
use chrono::Utc;
use clap::{Parser, Subcommand};
use tracing::info;
use tracing_subscriber::EnvFilter;

use bodytrend::config::AppConfig;
use bodytrend::db::Database;
use bodytrend::metrics::normalize::resolve_millis;
use bodytrend::metrics::{BodyView, Goals, Metric, Period, RawSample, RawTimestamp};

#[derive(Parser)]
#[command(name = "bodytrend")]
#[command(author, version, about = "Body weight and body-fat trends with goal ETA")]
struct Cli {
    /// SQLite database path (overrides BODYTREND_DB)
    #[arg(long, global = true)]
    db: Option<String>,

    /// UTC offset in hours used for calendar days (overrides BODYTREND_TZ_OFFSET)
    #[arg(long, global = true, allow_hyphen_values = true)]
    tz_offset: Option<i32>,

    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand)]
enum Commands {
    /// Log a measurement
    Log {
        /// Body weight in kg
        #[arg(short, long)]
        weight: Option<f64>,

        /// Body fat percentage
        #[arg(short, long)]
        body_fat: Option<f64>,

        /// Muscle mass in kg
        #[arg(short, long)]
        muscle: Option<f64>,

        /// Waist circumference in cm
        #[arg(long)]
        waist: Option<f64>,

        /// Optional notes
        #[arg(short, long)]
        notes: Option<String>,

        /// Measurement time (RFC 3339 or YYYY-MM-DD); defaults to now
        #[arg(long)]
        at: Option<String>,
    },

    /// List recent measurements
    List {
        /// Number of records to show
        #[arg(short, long, default_value = "10")]
        limit: usize,
    },

    /// Import measurements from a JSON array
    Import {
        /// Path to the JSON file
        path: String,
    },

    /// Show or set goals
    Goal {
        /// Target weight in kg
        #[arg(short, long)]
        weight: Option<f64>,

        /// Target body fat percentage
        #[arg(short, long)]
        body_fat: Option<f64>,

        /// Remove all goals
        #[arg(long, conflicts_with_all = ["weight", "body_fat"])]
        clear: bool,
    },

    /// Show trend report
    Report {
        #[arg(short, long, value_enum, default_value_t = Period::Day)]
        period: Period,

        #[arg(short, long, value_enum, default_value_t = Metric::Weight)]
        metric: Metric,

        /// Print the overlay as JSON
        #[arg(long)]
        json: bool,
    },
}

fn validate(weight: Option<f64>, body_fat: Option<f64>) -> Result<()> {
    ensure!(
        weight.is_some() || body_fat.is_some(),
        "nothing to log: pass --weight and/or --body-fat"
    );
    if let Some(w) = weight {
        ensure!(w.is_finite() && w > 0.0 && w <= 500.0, "weight out of range: {}", w);
    }
    if let Some(bf) = body_fat {
        ensure!(bf.is_finite() && (0.0..=100.0).contains(&bf), "body fat out of range: {}", bf);
    }
    Ok(())
}

fn main() -> Result<()> {
    // Load .env file if present
    dotenvy::dotenv().ok();

    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();

    let mut config = AppConfig::from_env()?;
    if let Some(db) = cli.db {
        config.db_path = db;
    }
    if let Some(offset) = cli.tz_offset {
        config.tz_offset_hours = offset;
    }
    let format = config.format_config()?;

    let mut db = Database::open_in(&config.db_path, format.tz)
        .with_context(|| format!("failed to open database {}", config.db_path))?;

    match cli.command {
        Some(Commands::Log { weight, body_fat, muscle, waist, notes, at }) => {
            validate(weight, body_fat)?;
            let ts = match at {
                Some(text) => {
                    let ts = RawTimestamp::Text(text);
                    ensure!(resolve_millis(&ts, &format.tz).is_some(), "unreadable time: {:?}", ts);
                    ts
                }
                None => RawTimestamp::from(Utc::now().timestamp_millis()),
            };
            let sample = RawSample {
                muscle,
                waist,
                notes,
                ..RawSample::new(ts, weight, body_fat)
            };
            let id = db.add_sample(&sample)?;
            println!("Logged: weight {:?}, body fat {:?} (id: {})", weight, body_fat, id);
        }

        Some(Commands::List { limit }) => {
            let samples = db.list_recent(limit)?;
            let view = BodyView::new(&samples, format);
            println!("Recent measurements:");
            println!("{:-<60}", "");
            for s in view.samples() {
                println!(
                    "{} | {:>6} kg | {:>5} % ",
                    s.date,
                    s.weight.map_or("-".to_string(), |w| format!("{:.1}", w)),
                    s.body_fat.map_or("-".to_string(), |bf| format!("{:.1}", bf)),
                );
            }
        }

        Some(Commands::Import { path }) => {
            let text = std::fs::read_to_string(&path)
                .with_context(|| format!("failed to read {}", path))?;
            let samples: Vec<RawSample> = serde_json::from_str(&text)
                .with_context(|| format!("{} is not a JSON array of samples", path))?;
            let count = db.import_samples(&samples)?;
            println!("Imported {} samples from {}", count, path);
        }

        Some(Commands::Goal { weight, body_fat, clear }) => {
            let current = db.get_goals()?;
            let goals = if clear {
                Goals::default()
            } else {
                Goals {
                    weight_goal: weight.or(current.weight_goal),
                    body_fat_goal: body_fat.or(current.body_fat_goal),
                }
            };
            if clear || weight.is_some() || body_fat.is_some() {
                db.set_goals(&goals)?;
            }
            println!(
                "Goals: weight {}, body fat {}",
                goals.weight_goal.map_or("-".to_string(), |g| format!("{:.1} kg", g)),
                goals.body_fat_goal.map_or("-".to_string(), |g| format!("{:.1} %", g)),
            );
        }

        Some(Commands::Report { period, metric, json }) => {
            let samples = db.list_recent(config.history_limit)?;
            let goals = db.get_goals()?;
            info!(samples = samples.len(), ?period, ?metric, "building report");

            let view = BodyView::new(&samples, format).with_rolling_window(config.rolling_window);
            let overlay = view.overlay(period, metric, &goals, Utc::now());

            if json {
                println!("{}", serde_json::to_string_pretty(&overlay)?);
            } else {
                println!("{}", overlay.format());
            }
        }

        None => {
            let samples = db.list_recent(config.history_limit)?;
            let goals = db.get_goals()?;
            let view = BodyView::new(&samples, format).with_rolling_window(config.rolling_window);
            println!("{}", view.overlay(Period::Day, Metric::Weight, &goals, Utc::now()).format());
        }
    }

    Ok(())
}
