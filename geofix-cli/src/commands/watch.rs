//! Watch command - significant-change monitoring along a simulated route.
//!
//! The simulated receiver travels in a straight line between two points and
//! reports a significant change at each step. One observer prints the events
//! and leaves after `count` of them.

use std::ops::ControlFlow;
use std::time::Duration;

use geofix::{
    Coordinates, GazetteerGeocoder, LocationEvent, LocationSample, ManagerConfig,
    SimulatedProvider,
};
use tokio::sync::mpsc;
use tracing::{info, warn};

use super::common;
use crate::error::CliError;

/// Accuracy reported for significant-change fixes.
const SIGNIFICANT_ACCURACY_M: f64 = 500.0;

/// Arguments for the watch command.
pub struct WatchArgs {
    pub from: (f64, f64),
    pub to: (f64, f64),
    pub steps: usize,
    pub interval: Duration,
    pub count: Option<usize>,
    pub reverse: bool,
}

/// Points along the straight line `from` → `to`, both ends included.
fn route(from: Coordinates, to: Coordinates, steps: usize) -> Vec<Coordinates> {
    let steps = steps.max(1);
    (0..=steps)
        .map(|i| {
            let t = i as f64 / steps as f64;
            Coordinates::new(
                from.latitude + (to.latitude - from.latitude) * t,
                from.longitude + (to.longitude - from.longitude) * t,
            )
        })
        .collect()
}

/// Run the watch command.
pub async fn run(args: WatchArgs, config: ManagerConfig) -> Result<(), CliError> {
    let from = common::coordinates(args.from.0, args.from.1)?;
    let to = common::coordinates(args.to.0, args.to.1)?;
    let points = route(from, to, args.steps);
    let limit = args.count.unwrap_or(points.len()).max(1);

    let provider = SimulatedProvider::new();
    let geocoder = GazetteerGeocoder::new(common::builtin_places());
    let manager = common::manager(config, &provider, &geocoder)?;

    let (tx, mut rx) = mpsc::unbounded_channel::<LocationEvent>();
    let mut seen = 0;
    let registered = manager.register_significant_change_observer(move |event| {
        let _ = tx.send(event.clone());
        seen += 1;
        if seen >= limit {
            ControlFlow::Break(())
        } else {
            ControlFlow::Continue(())
        }
    });
    if !registered {
        return Err(CliError::InvalidArgument(
            "significant-change monitoring is not available".to_string(),
        ));
    }
    info!(steps = points.len(), limit, "Watching significant changes");

    let route_provider = provider.clone();
    let interval = args.interval;
    let travel = tokio::spawn(async move {
        for point in points {
            tokio::time::sleep(interval).await;
            route_provider.emit_significant(Ok(LocationSample::new(point, SIGNIFICANT_ACCURACY_M)));
        }
        route_provider.close_significant();
    });

    while let Some(event) = rx.recv().await {
        match event {
            Ok(sample) => {
                common::print_sample("Moved", &sample);
                if args.reverse {
                    match manager.reverse_geocode(sample).await {
                        Ok(lookup) => println!("           near {}", lookup.address),
                        Err(e) => println!("           ({})", e),
                    }
                }
            }
            Err(e) => {
                warn!(error = %e, "Significant-change error event");
                println!("Receiver:  {}", e);
            }
        }
    }

    travel.abort();
    manager.shutdown();
    Ok(())
}
