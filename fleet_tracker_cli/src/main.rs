use std::{cell::Cell, fs::OpenOptions, path::{Path, PathBuf}, rc::Rc, time::Duration};

use anyhow::{bail, Context};
use clap::{Parser, Subcommand};
use fleet_tracker_lib::{
    driver::{drive, SessionCommand},
    services::{
        HttpTelemetrySink, LocationWatcher, LoggingSink, OsrmRouteService, RouteProvider, TelemetryReporter,
        TelemetrySink,
    },
    Configuration, Coordinate, SessionOptions, SessionState, SessionView, TravelMode, TripSession,
    TripTrackingSession,
};
use futures::{channel::mpsc, StreamExt};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use crate::{headless::LogSurface, simulator::SimulatedDevice};

mod gpx_util;
mod headless;
mod simulator;

#[derive(Parser)]
#[command(name = "fleet-tracker")]
#[command(about = "Plan routes and drive simulated trips through the live tracker", long_about = None)]
struct Cli {
    /// YAML configuration file
    #[arg(short, long)]
    config: Option<PathBuf>,
    /// Also append logs to this file
    #[arg(long)]
    log_file: Option<PathBuf>,
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Plan a route and print its length and duration
    Route {
        #[arg(value_parser = parse_coordinate)]
        from: Coordinate,
        #[arg(value_parser = parse_coordinate)]
        to: Coordinate,
        #[arg(long)]
        mode: Option<TravelMode>,
    },
    /// Track a trip along the planned route, or along a recorded GPX track
    Simulate {
        #[arg(long, value_parser = parse_coordinate)]
        from: Option<Coordinate>,
        #[arg(long, value_parser = parse_coordinate)]
        to: Option<Coordinate>,
        #[arg(long)]
        gpx: Option<PathBuf>,
        #[arg(long)]
        mode: Option<TravelMode>,
        #[arg(long)]
        trip_id: Option<i64>,
        #[arg(long, default_value_t = 50.0)]
        speed_kph: f64,
        /// Time between samples
        #[arg(long, default_value_t = 1000)]
        interval_ms: u64,
    },
}

#[tokio::main(flavor = "current_thread")]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    init_logging(cli.log_file.as_deref())?;

    let config = match &cli.config {
        Some(path) => Configuration::load(path).with_context(|| format!("Failed to load {}", path.display()))?,
        None => Configuration::default(),
    };

    match cli.command {
        Commands::Route { from, to, mode } => {
            let routes = OsrmRouteService::new(config.routing_url.as_str());
            match routes.calculate_route(from, to, mode.unwrap_or(config.routing_profile)).await? {
                Some(route) => {
                    let summary = route.summary();
                    println!("{}\t{}\t{} points", summary.distance, summary.duration, route.geometry.len());
                }
                None => println!("No route found"),
            }
        }
        Commands::Simulate {
            from,
            to,
            gpx,
            mode,
            trip_id,
            speed_kph,
            interval_ms,
        } => {
            if speed_kph <= 0.0 {
                bail!("--speed-kph must be positive");
            }

            let mode = mode.unwrap_or(config.routing_profile);
            let (path, destination) = plan_path(&config, from, to, gpx.as_deref(), mode).await?;
            let device = SimulatedDevice::along(&path, speed_kph, Duration::from_millis(interval_ms));

            let mut options = SessionOptions::from(&config);
            options.trip_id = trip_id;
            options.mode = mode;

            let trip = match &config.backend_url {
                Some(url) => {
                    let mut sink = HttpTelemetrySink::new(url.as_str()).with_timeout(config.telemetry_timeout());
                    if let Some(token) = &config.api_token {
                        sink = sink.with_token(token.as_str());
                    }
                    simulate(&config, options, device, destination, sink).await
                }
                None => simulate(&config, options, device, destination, LoggingSink).await,
            };

            print_trip(&trip);
        }
    }

    Ok(())
}

fn init_logging(log_file: Option<&Path>) -> anyhow::Result<()> {
    let file_layer = match log_file {
        Some(path) => {
            if let Some(dir) = path.parent() {
                std::fs::create_dir_all(dir)?;
            }
            let file = OpenOptions::new()
                .create(true)
                .append(true)
                .open(path)
                .with_context(|| format!("Failed to open log file {}", path.display()))?;
            Some(tracing_subscriber::fmt::layer().with_ansi(false).with_writer(file))
        }
        None => None,
    };

    tracing_subscriber::registry()
        .with(tracing_subscriber::EnvFilter::try_from_default_env()
            .unwrap_or_else(|_| format!("{}=trace,fleet_tracker_lib=debug", env!("CARGO_CRATE_NAME")).into())
        )
        .with(tracing_subscriber::fmt::layer())
        .with(file_layer)
        .init();

    Ok(())
}

/// The path the simulated vehicle follows, and where the trip is headed.
async fn plan_path(
    config: &Configuration,
    from: Option<Coordinate>,
    to: Option<Coordinate>,
    gpx: Option<&Path>,
    mode: TravelMode,
) -> anyhow::Result<(Vec<Coordinate>, Coordinate)> {
    if let Some(gpx) = gpx {
        let track = gpx_util::read_track(gpx)?;
        let Some(&end) = track.last() else {
            bail!("{} contains no track points", gpx.display());
        };
        return Ok((track, to.unwrap_or(end)));
    }

    let (Some(from), Some(to)) = (from, to) else {
        bail!("--from and --to are required without --gpx");
    };

    let routes = OsrmRouteService::new(config.routing_url.as_str());
    match routes.calculate_route(from, to, mode).await? {
        Some(route) => Ok((route.geometry, to)),
        None => {
            tracing::warn!("No route found, driving in a straight line");
            Ok((vec![from, to], to))
        }
    }
}

async fn simulate<S: TelemetrySink>(
    config: &Configuration,
    options: SessionOptions,
    device: SimulatedDevice,
    destination: Coordinate,
    sink: S,
) -> TripSession {
    let finished = device.finished();

    let watcher = LocationWatcher::new(device, config.position_options());
    let routes = OsrmRouteService::new(config.routing_url.as_str());
    let (reporter, worker) = TelemetryReporter::new(sink, config.telemetry_queue);

    let session = TripTrackingSession::<LogSurface, _, _>::open(options, "terminal", watcher, routes, reporter).await;

    let (commands, rx) = mpsc::unbounded();
    let _ = commands.unbounded_send(SessionCommand::SetDestination(destination));
    let _ = commands.unbounded_send(SessionCommand::Start);

    let interrupt = futures::stream::once(tokio::signal::ctrl_c())
        .flat_map(|_| futures::stream::iter([SessionCommand::Stop, SessionCommand::Close]));
    let input = futures::stream::select(rx, interrupt).boxed_local();

    let observer = on_view(commands, finished);
    let (trip, ()) = futures::join!(drive(session, input, observer), worker.run());
    trip
}

/// Logs progress and ends the trip once the vehicle has arrived or the
/// simulated path runs out.
fn on_view(commands: mpsc::UnboundedSender<SessionCommand>, finished: Rc<Cell<bool>>) -> impl FnMut(SessionView) {
    let (mut stopping, mut closing) = (false, false);
    move |view: SessionView| {
        if view.is_tracking() {
            tracing::info!(
                "{:.2} km traveled, {:.2} km to go, {:.0} km/h",
                view.stats.total_distance_traveled_meters / 1000.0,
                view.stats.distance_to_destination_meters / 1000.0,
                view.stats.current_speed_kph
            );
        }
        if let Some(error) = &view.error {
            tracing::warn!("{}", error.message);
        }

        if view.can_stop() && (view.arrived || finished.get()) && !stopping {
            stopping = true;
            let _ = commands.unbounded_send(SessionCommand::Stop);
        } else if view.state.is_terminal() && !closing {
            closing = true;
            let _ = commands.unbounded_send(SessionCommand::Close);
        }
    }
}

fn print_trip(trip: &TripSession) {
    let outcome = match trip.state {
        SessionState::Completed => "completed",
        SessionState::Failed => "failed",
        _ => "abandoned",
    };
    println!("Trip {}", outcome);
    println!("\tdistance\t{:.2} km", trip.stats.total_distance_traveled_meters / 1000.0);
    println!("\tduration\t{:.0} s", trip.stats.elapsed_seconds);
    if let Some(route) = &trip.route {
        let summary = route.summary();
        println!("\tplanned \t{} / {}", summary.distance, summary.duration);
    }
}

fn parse_coordinate(s: &str) -> Result<Coordinate, String> {
    let (lat, lng) = s.split_once(',').ok_or("expected `lat,lng`")?;
    let parse = |value: &str| value.trim().parse::<f64>().map_err(|err| format!("`{}`: {}", value.trim(), err));

    let coordinate = Coordinate::new(parse(lat)?, parse(lng)?);
    if !coordinate.is_valid() {
        return Err(format!("{s} is out of range"));
    }
    Ok(coordinate)
}
