//! Replays a delivery day through the stop detector from the command line.

use std::{path::PathBuf, sync::Arc, time::Duration as StdDuration};

use anyhow::{bail, Context, Result};
use chrono::{DateTime, Utc};
use clap::{Args, Parser, Subcommand, ValueEnum};
use log::{info, warn};

use rundelivery_lib::{
    init_logging,
    models::{Company, Coordinate, DailyEntryInput, PaymentType, PositionSample, StopStatus},
    platform::{simulated, ChannelLocationSource, CountingWakeLock, Notifier},
    settings::DetectionMode,
    AppState,
};

/// Delivery day tracker with automatic stop detection.
#[derive(Debug, Parser)]
#[command(name = "rundelivery")]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Directory holding the database and settings.
    #[arg(long, env = "RUNDELIVERY_DATA_DIR", default_value = "rundelivery-data")]
    data_dir: PathBuf,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Debug, Subcommand)]
enum Commands {
    /// Register a company with its depot and make it the active one.
    AddCompany(CompanyArgs),
    /// List registered companies.
    Companies,
    /// Show or change detection settings.
    Configure(ConfigureArgs),
    /// Move a company's depot.
    SetDepot {
        id: String,
        #[arg(long, allow_hyphen_values = true)]
        lat: f64,
        #[arg(long, allow_hyphen_values = true)]
        lon: f64,
    },
    /// Generate a synthetic day around the active company's depot and track it.
    Simulate(SimulateArgs),
    /// Track a recorded JSON array of position samples.
    Replay(ReplayArgs),
    /// List stops by status.
    Stops {
        #[arg(long, value_enum, default_value = "pending")]
        status: StatusArg,
    },
    /// Confirm a pending stop as a delivery.
    Confirm { id: String },
    /// Discard a pending stop.
    Ignore { id: String },
    /// Count a delivery by hand.
    Add,
    /// Remove one delivery from today's count.
    Remove,
    /// Save today's entry and reset the counter.
    EndDay(EndDayArgs),
    /// Show saved daily entries.
    History,
}

#[derive(Debug, Args)]
struct CompanyArgs {
    #[arg(long)]
    id: String,
    #[arg(long)]
    name: String,
    #[arg(long, allow_hyphen_values = true)]
    lat: f64,
    #[arg(long, allow_hyphen_values = true)]
    lon: f64,
    #[arg(long, default_value_t = 0.0)]
    daily_rate: f64,
    #[arg(long, default_value_t = 0.0)]
    delivery_fee: f64,
    /// Paid a fixed monthly amount instead of a daily rate.
    #[arg(long)]
    fixed: bool,
}

#[derive(Debug, Args)]
struct ConfigureArgs {
    #[arg(long)]
    auto_count: Option<bool>,
    /// Seconds a carrier must stand still before a stop counts.
    #[arg(long)]
    stop_duration: Option<u64>,
    /// Radius around the depot where stops are never counted, in metres.
    #[arg(long)]
    base_radius: Option<f64>,
    /// Hold detected stops for review instead of counting them right away.
    #[arg(long)]
    review_stops: Option<bool>,
    #[arg(long, value_enum)]
    mode: Option<ModeArg>,
}

#[derive(Debug, Clone, Copy, ValueEnum)]
enum ModeArg {
    Displacement,
    Speed,
}

#[derive(Debug, Args)]
struct SimulateArgs {
    #[arg(long, default_value_t = 7)]
    seed: u64,
    /// How long each synthetic stop lasts beyond the configured stop duration.
    #[arg(long)]
    dwell_secs: Option<i64>,
    #[command(flatten)]
    pacing: PacingArgs,
}

#[derive(Debug, Args)]
struct ReplayArgs {
    file: PathBuf,
    #[command(flatten)]
    pacing: PacingArgs,
}

#[derive(Debug, Args)]
struct PacingArgs {
    /// Feed samples at their recorded spacing. Speed detection needs this
    /// because its dwell timer runs on the wall clock.
    #[arg(long)]
    realtime: bool,
}

#[derive(Debug, Args)]
struct EndDayArgs {
    #[arg(long, default_value_t = 0.0)]
    tips: f64,
    #[arg(long, default_value_t = 0.0)]
    start_km: f64,
    #[arg(long, default_value_t = 0.0)]
    end_km: f64,
    #[arg(long)]
    day_off: bool,
}

#[derive(Debug, Clone, Copy, ValueEnum)]
enum StatusArg {
    Pending,
    Confirmed,
    Ignored,
}

impl From<StatusArg> for StopStatus {
    fn from(arg: StatusArg) -> Self {
        match arg {
            StatusArg::Pending => StopStatus::Pending,
            StatusArg::Confirmed => StopStatus::Confirmed,
            StatusArg::Ignored => StopStatus::Ignored,
        }
    }
}

fn notifier() -> Arc<dyn Notifier> {
    #[cfg(feature = "audio")]
    {
        Arc::new(rundelivery_lib::audio::ToneNotifier::new())
    }
    #[cfg(not(feature = "audio"))]
    {
        Arc::new(rundelivery_lib::platform::LogNotifier)
    }
}

fn main() -> Result<()> {
    init_logging();
    let cli = Cli::parse();

    let runtime = tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()?;

    runtime.block_on(run(cli))
}

async fn run(cli: Cli) -> Result<()> {
    let location = Arc::new(ChannelLocationSource::new());
    let app = AppState::open(
        &cli.data_dir,
        location.clone(),
        Arc::new(CountingWakeLock::new()),
        notifier(),
    )
    .await?;

    match cli.command {
        Commands::AddCompany(args) => add_company(&app, args).await,
        Commands::Companies => {
            let active = app.settings.active_company_id();
            for company in app.db.list_companies().await? {
                let marker = if active.as_deref() == Some(company.id.as_str()) {
                    "*"
                } else {
                    " "
                };
                let depot = company
                    .base_location
                    .map(|base| base.to_string())
                    .unwrap_or_else(|| "no depot".to_string());
                println!(
                    "{marker} {}  {}  {}  {}",
                    company.id,
                    company.name,
                    company.payment_type.as_str(),
                    depot
                );
            }
            Ok(())
        }
        Commands::Configure(args) => {
            let mut tracker = app.settings.tracker();
            if let Some(auto_count) = args.auto_count {
                tracker.auto_count = auto_count;
            }
            if let Some(secs) = args.stop_duration {
                tracker.stop_duration_secs = secs;
            }
            if let Some(radius) = args.base_radius {
                tracker.base_radius_m = radius;
            }
            if let Some(review) = args.review_stops {
                tracker.review_stops = review;
            }
            if let Some(mode) = args.mode {
                tracker.detection_mode = match mode {
                    ModeArg::Displacement => DetectionMode::Displacement,
                    ModeArg::Speed => DetectionMode::Speed,
                };
            }
            app.settings.update_tracker(tracker.clone())?;
            println!("{}", serde_json::to_string_pretty(&tracker)?);
            Ok(())
        }
        Commands::SetDepot { id, lat, lon } => {
            if !app
                .db
                .set_company_base_location(&id, Coordinate::new(lat, lon))
                .await?
            {
                bail!("no company with id {id}");
            }
            Ok(())
        }
        Commands::Simulate(args) => {
            let depot = active_depot(&app).await?;
            let stop_secs = app.settings.tracker().stop_duration_secs;
            let dwell = args
                .dwell_secs
                .unwrap_or_else(|| i64::try_from(stop_secs).unwrap_or(i64::MAX / 2) + 10);
            let track = simulated::demo_day(depot, Utc::now(), dwell, args.seed);
            track_day(&app, &location, track, &args.pacing).await
        }
        Commands::Replay(args) => {
            let track = simulated::load_track(&args.file)?;
            track_day(&app, &location, track, &args.pacing).await
        }
        Commands::Stops { status } => {
            for stop in app.review.list_by_status(status.into()).await? {
                println!(
                    "{}  {}  {}  {}",
                    stop.id,
                    stop.detected_at()
                        .map(|at| at.to_rfc3339())
                        .unwrap_or_default(),
                    stop.status.as_str(),
                    stop.maps_url()
                );
            }
            Ok(())
        }
        Commands::Confirm { id } => {
            if !app.review.confirm(&id).await? {
                bail!("no pending stop with id {id}");
            }
            println!("{} deliveries", app.tracking.counter().get().await);
            Ok(())
        }
        Commands::Ignore { id } => {
            if !app.review.ignore(&id).await? {
                bail!("no pending stop with id {id}");
            }
            Ok(())
        }
        Commands::Add => {
            println!("{} deliveries", app.tracking.manual_increment().await?);
            Ok(())
        }
        Commands::Remove => {
            println!("{} deliveries", app.tracking.manual_decrement().await?);
            Ok(())
        }
        Commands::EndDay(args) => end_day(&app, args).await,
        Commands::History => {
            for entry in app.db.list_daily_entries().await? {
                println!(
                    "{}  {:>3} deliveries  {:>8.2} earned  {:>6.1} km{}",
                    entry.id,
                    entry.deliveries_count,
                    entry.total_earned,
                    entry.km_driven,
                    if entry.is_day_off { "  (day off)" } else { "" }
                );
            }
            Ok(())
        }
    }
}

async fn add_company(app: &AppState, args: CompanyArgs) -> Result<()> {
    let company = Company {
        payment_type: if args.fixed {
            PaymentType::Fixed
        } else {
            PaymentType::Daily
        },
        daily_rate: args.daily_rate,
        delivery_fee: args.delivery_fee,
        ..Company::new(args.id, args.name)
    }
    .with_base_location(Coordinate::new(args.lat, args.lon));

    app.db.save_company(&company).await?;
    app.tracking.select_company(&company.id).await?;
    println!("{} is now the active company", company.name);
    Ok(())
}

async fn active_depot(app: &AppState) -> Result<Coordinate> {
    let company_id = app
        .settings
        .active_company_id()
        .context("no active company; run add-company first")?;
    app.db
        .get_company(&company_id)
        .await?
        .and_then(|company| company.base_location)
        .with_context(|| format!("company {company_id} has no base location"))
}

async fn track_day(
    app: &AppState,
    location: &ChannelLocationSource,
    track: Vec<PositionSample>,
    pacing: &PacingArgs,
) -> Result<()> {
    let Some(last) = track.last().map(|sample| sample.timestamp) else {
        bail!("track has no samples");
    };

    if app.settings.tracker().detection_mode == DetectionMode::Speed && !pacing.realtime {
        warn!("Speed detection times dwells on the wall clock; pass --realtime to detect stops");
    }

    app.tracking.start_tracking().await?;
    info!("Replaying {} samples", track.len());

    let mut previous: Option<DateTime<Utc>> = None;
    for sample in track {
        if pacing.realtime {
            if let Some(previous) = previous {
                let gap = (sample.timestamp - previous)
                    .to_std()
                    .unwrap_or(StdDuration::ZERO);
                tokio::time::sleep(gap).await;
            }
            previous = Some(sample.timestamp);
        }
        location.push_sample(sample);
    }

    wait_for_fix(app, last).await;
    let snapshot = app.tracking.stop_tracking().await?;

    println!("{} stops detected", snapshot.stops_detected);
    for stop in app.review.pending().await? {
        println!("pending  {}  {}", stop.id, stop.location);
    }
    println!("{} deliveries", snapshot.deliveries);
    Ok(())
}

async fn wait_for_fix(app: &AppState, last: DateTime<Utc>) {
    for _ in 0..3000 {
        if app.tracking.snapshot().await.last_fix_at >= Some(last) {
            return;
        }
        tokio::time::sleep(StdDuration::from_millis(10)).await;
    }
    warn!("Gave up waiting for the location loop to catch up");
}

async fn end_day(app: &AppState, args: EndDayArgs) -> Result<()> {
    let handoff = app.tracking.begin_end_day().await?;
    if !handoff.pending_stops.is_empty() {
        warn!(
            "{} stops were never reviewed and will be discarded",
            handoff.pending_stops.len()
        );
    }

    let input = DailyEntryInput {
        is_day_off: args.day_off,
        tips: args.tips,
        start_km: args.start_km,
        end_km: args.end_km,
        ..handoff.suggested
    };
    let entry = app.tracking.finalize_day(input).await?;
    println!(
        "{}: {} deliveries, {:.2} earned",
        entry.id, entry.deliveries_count, entry.total_earned
    );
    Ok(())
}
