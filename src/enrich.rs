/// Elevation recomputation for a single route
///
/// The provider writes ground elevations onto the route (retrying timeouts
/// per the `RetryPolicy`), remaining gaps are interpolated along each
/// segment, and when the route ends up complete its elevation statistics are
/// recomputed.
use std::thread;

use gpx::Waypoint;
use tracing::warn;

use crate::config::RetryPolicy;
use crate::error::{ElevationError, EnrichError};
use crate::terrain_elevation::{cumulative_distances, ElevationProvider};
use crate::track::{has_all_elevations, Route};

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ElevationStats {
    pub min_elevation: f64,
    pub max_elevation: f64,
    pub uphill: f64,
    /// Magnitude of the accumulated descent, never negative
    pub downhill: f64,
}

#[derive(Debug, Clone, PartialEq)]
pub enum EnrichOutcome {
    /// Every point has an elevation; the route was updated in place.
    Recomputed(ElevationStats),
    /// Some points are still missing elevation after lookup and interpolation.
    Incomplete { initially_complete: bool },
}

pub fn enrich<P: ElevationProvider>(
    route: &mut Route,
    provider: &mut P,
    policy: &RetryPolicy,
) -> Result<EnrichOutcome, EnrichError> {
    let initially_complete = has_all_elevations(route);

    add_elevations_with_retry(route, provider, policy)?;
    fill_missing_elevations(route);

    if !has_all_elevations(route) {
        return Ok(EnrichOutcome::Incomplete { initially_complete });
    }

    match elevation_stats(route) {
        Some(stats) => Ok(EnrichOutcome::Recomputed(stats)),
        None => Ok(EnrichOutcome::Incomplete { initially_complete }),
    }
}

fn add_elevations_with_retry<P: ElevationProvider>(
    route: &mut Route,
    provider: &mut P,
    policy: &RetryPolicy,
) -> Result<(), EnrichError> {
    let mut attempts = 0;
    loop {
        attempts += 1;
        match provider.add_elevations(route, true) {
            Ok(()) => return Ok(()),
            Err(ElevationError::Timeout(message)) => {
                if !policy.allows_retry(attempts) {
                    return Err(EnrichError::RetriesExhausted { attempts });
                }
                warn!(attempt = attempts, %message, "elevation lookup timed out, retrying");
                if !policy.backoff.is_zero() {
                    thread::sleep(policy.backoff);
                }
            }
            Err(other) => return Err(other.into()),
        }
    }
}

/// Linear interpolation between the nearest known elevations on either side,
/// weighted by distance along the segment. Leading and trailing gaps have
/// nothing to interpolate from and stay empty.
pub fn fill_missing_elevations(route: &mut Route) {
    for segment in route.segments_mut() {
        fill_segment(segment);
    }
}

fn fill_segment(points: &mut [Waypoint]) {
    if points.iter().all(|p| p.elevation.is_some()) {
        return;
    }

    let distances = cumulative_distances(points);
    let known: Vec<usize> = points
        .iter()
        .enumerate()
        .filter_map(|(i, p)| p.elevation.map(|_| i))
        .collect();

    for pair in known.windows(2) {
        let (start, end) = (pair[0], pair[1]);
        if end - start < 2 {
            continue;
        }
        let (Some(start_ele), Some(end_ele)) = (points[start].elevation, points[end].elevation)
        else {
            continue;
        };

        let span = distances[end] - distances[start];
        for i in start + 1..end {
            let ratio = if span > 0.0 {
                (distances[i] - distances[start]) / span
            } else {
                (i - start) as f64 / (end - start) as f64
            };
            points[i].elevation = Some(start_ele + (end_ele - start_ele) * ratio);
        }
    }
}

/// Extremes and cumulative climb over the route's track segments.
///
/// Returns `None` when there is no track point with an elevation.
pub fn elevation_stats(route: &Route) -> Option<ElevationStats> {
    let mut min_elevation = f64::INFINITY;
    let mut max_elevation = f64::NEG_INFINITY;
    let mut uphill = 0.0;
    let mut downhill = 0.0;

    for segment in route.track_segments() {
        let elevations: Vec<f64> = segment.iter().filter_map(|p| p.elevation).collect();
        for &elevation in &elevations {
            min_elevation = min_elevation.min(elevation);
            max_elevation = max_elevation.max(elevation);
        }
        let (up, down) = uphill_downhill(&elevations);
        uphill += up;
        downhill += down;
    }

    if min_elevation.is_infinite() {
        return None;
    }
    Some(ElevationStats {
        min_elevation,
        max_elevation,
        uphill,
        downhill,
    })
}

/// Climb and descent of an elevation profile after 3-point smoothing
/// (0.3/0.4/0.3 on interior points, endpoints kept as they are).
pub fn uphill_downhill(elevations: &[f64]) -> (f64, f64) {
    let n = elevations.len();
    let smoothed: Vec<f64> = (0..n)
        .map(|i| {
            if i > 0 && i + 1 < n {
                elevations[i - 1] * 0.3 + elevations[i] * 0.4 + elevations[i + 1] * 0.3
            } else {
                elevations[i]
            }
        })
        .collect();

    let mut uphill = 0.0;
    let mut downhill = 0.0;
    for w in smoothed.windows(2) {
        let delta = w[1] - w[0];
        if delta > 0.0 {
            uphill += delta;
        } else {
            downhill -= delta;
        }
    }
    (uphill, downhill)
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use crate::track::tests::route_with_elevations;
    use std::time::Duration;

    /// Writes a fixed elevation per point index; `None` leaves a gap.
    pub(crate) struct FixedProvider {
        pub elevations: Vec<Option<f64>>,
        pub calls: usize,
    }

    impl ElevationProvider for FixedProvider {
        fn add_elevations(&mut self, route: &mut Route, _smooth: bool) -> Result<(), ElevationError> {
            self.calls += 1;
            let mut values = self.elevations.iter().copied();
            for segment in route.segments_mut() {
                for point in segment.iter_mut() {
                    point.elevation = values.next().flatten();
                }
            }
            Ok(())
        }
    }

    /// Times out `timeouts` times, then behaves like `FixedProvider`.
    pub(crate) struct FlakyProvider {
        pub timeouts: usize,
        pub inner: FixedProvider,
    }

    impl ElevationProvider for FlakyProvider {
        fn add_elevations(&mut self, route: &mut Route, smooth: bool) -> Result<(), ElevationError> {
            if self.timeouts > 0 {
                self.timeouts -= 1;
                self.inner.calls += 1;
                return Err(ElevationError::Timeout("read timed out".to_string()));
            }
            self.inner.add_elevations(route, smooth)
        }
    }

    /// Fails every lookup with a non-retryable HTTP status.
    pub(crate) struct BrokenProvider;

    impl ElevationProvider for BrokenProvider {
        fn add_elevations(&mut self, _route: &mut Route, _smooth: bool) -> Result<(), ElevationError> {
            Err(ElevationError::Status {
                url: "https://tiles.invalid/12/1/1.png".to_string(),
                status: 503,
            })
        }
    }

    fn fixed(elevations: &[Option<f64>]) -> FixedProvider {
        FixedProvider {
            elevations: elevations.to_vec(),
            calls: 0,
        }
    }

    #[test]
    fn test_uphill_downhill_smoothed_profile() {
        // Smoothed profile is [10, 10.5, 12.5, 20]
        let (up, down) = uphill_downhill(&[10.0, 15.0, 5.0, 20.0]);
        assert!((up - 10.0).abs() < 1e-9);
        assert!(down.abs() < 1e-9);

        let (up, down) = uphill_downhill(&[100.0, 80.0, 60.0]);
        assert!(up.abs() < 1e-9);
        assert!((down - 40.0).abs() < 1e-9);

        assert_eq!(uphill_downhill(&[]), (0.0, 0.0));
        assert_eq!(uphill_downhill(&[5.0]), (0.0, 0.0));
    }

    #[test]
    fn test_recomputes_stats_from_provider_values() {
        let mut route = route_with_elevations(&[None, Some(999.0), None, None]);
        let mut provider = fixed(&[Some(10.0), Some(15.0), Some(5.0), Some(20.0)]);

        let outcome = enrich(&mut route, &mut provider, &RetryPolicy::default()).unwrap();
        let EnrichOutcome::Recomputed(stats) = outcome else {
            panic!("expected recomputed stats, got {:?}", outcome);
        };

        assert_eq!(stats.min_elevation, 5.0);
        assert_eq!(stats.max_elevation, 20.0);
        assert!((stats.uphill - 10.0).abs() < 1e-9);
        assert!(stats.downhill.abs() < 1e-9);
        assert_eq!(provider.calls, 1);
    }

    #[test]
    fn test_interior_gaps_are_interpolated() {
        let mut route = route_with_elevations(&[None; 5]);
        let mut provider = fixed(&[Some(100.0), None, None, None, Some(140.0)]);

        let outcome = enrich(&mut route, &mut provider, &RetryPolicy::default()).unwrap();
        assert!(matches!(outcome, EnrichOutcome::Recomputed(_)));

        // Points are evenly spaced, so interpolation is linear in the index
        let elevations: Vec<f64> = route.points().filter_map(|p| p.elevation).collect();
        let expected = [100.0, 110.0, 120.0, 130.0, 140.0];
        for (got, want) in elevations.iter().zip(expected) {
            assert!((got - want).abs() < 1e-6, "{} != {}", got, want);
        }
    }

    #[test]
    fn test_coincident_points_interpolate_by_index() {
        let mut route = route_with_elevations(&[Some(0.0), None, Some(30.0)]);
        for segment in route.segments_mut() {
            let first = segment[0].point();
            for point in segment.iter_mut() {
                *point = {
                    let mut moved = Waypoint::new(first);
                    moved.elevation = point.elevation;
                    moved
                };
            }
        }
        fill_missing_elevations(&mut route);
        let middle = route.points().nth(1).and_then(|p| p.elevation);
        assert_eq!(middle, Some(15.0));
    }

    #[test]
    fn test_edge_gaps_leave_route_incomplete() {
        let mut route = route_with_elevations(&[Some(1.0), Some(2.0), Some(3.0)]);
        let mut provider = fixed(&[None, Some(15.0), Some(16.0)]);

        let outcome = enrich(&mut route, &mut provider, &RetryPolicy::default()).unwrap();
        assert_eq!(outcome, EnrichOutcome::Incomplete { initially_complete: true });

        let mut route = route_with_elevations(&[None, None]);
        let mut provider = fixed(&[Some(15.0), None]);
        let outcome = enrich(&mut route, &mut provider, &RetryPolicy::default()).unwrap();
        assert_eq!(outcome, EnrichOutcome::Incomplete { initially_complete: false });
    }

    #[test]
    fn test_timeouts_are_retried_until_success() {
        let mut route = route_with_elevations(&[None, None]);
        let mut provider = FlakyProvider {
            timeouts: 2,
            inner: fixed(&[Some(400.0), Some(420.0)]),
        };

        let outcome = enrich(&mut route, &mut provider, &RetryPolicy::unbounded()).unwrap();
        assert!(matches!(outcome, EnrichOutcome::Recomputed(_)));
        assert_eq!(provider.inner.calls, 3);
    }

    #[test]
    fn test_capped_retries_give_up() {
        let mut route = route_with_elevations(&[None, None]);
        let mut provider = FlakyProvider {
            timeouts: 10,
            inner: fixed(&[Some(400.0), Some(420.0)]),
        };

        let policy = RetryPolicy::capped(3, Duration::ZERO);
        let err = enrich(&mut route, &mut provider, &policy).unwrap_err();
        assert!(matches!(err, EnrichError::RetriesExhausted { attempts: 3 }));
        assert_eq!(provider.inner.calls, 3);
    }

    #[test]
    fn test_other_provider_errors_are_not_retried() {
        let mut route = route_with_elevations(&[Some(1.0)]);
        let err = enrich(&mut route, &mut BrokenProvider, &RetryPolicy::default()).unwrap_err();
        assert!(matches!(err, EnrichError::Provider(ElevationError::Status { status: 503, .. })));
    }
}
