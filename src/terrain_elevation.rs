/// Terrain elevation lookups from Terrarium tiles
///
/// Tiles come from the AWS open-data `elevation-tiles-prod` bucket and are
/// kept in a disk cache so a rerun only downloads what it has not seen. One
/// `TerrainTileProvider` is opened per cleaning run and reused for every
/// record.
use std::collections::HashMap;
use std::fs;
use std::path::PathBuf;
use std::thread;
use std::time::{Duration, Instant};

use geo::{point, HaversineDistance};
use gpx::Waypoint;
use image::{ImageFormat, RgbImage};
use reqwest::blocking::Client;
use reqwest::StatusCode;
use tracing::{debug, info, warn};

use crate::error::ElevationError;
use crate::track::Route;

/// Anything that can put ground elevations onto a route.
pub trait ElevationProvider {
    /// Overwrites the elevation of every point in `route` with the ground
    /// elevation at its coordinate. Points without terrain data end up with
    /// no elevation. With `smooth`, elevations are averaged over a distance
    /// window along each segment.
    fn add_elevations(&mut self, route: &mut Route, smooth: bool) -> Result<(), ElevationError>;
}

/// Terrarium tiles are always 256x256 pixels.
const TILE_SIZE: u32 = 256;

#[derive(Debug, Clone)]
pub struct TerrainConfig {
    pub zoom_level: u8,
    /// Cache directory path
    pub cache_dir: PathBuf,
    /// Rate limiting: max requests per second
    pub max_requests_per_second: u32,
    /// Rolling smoothing window in meters used when smoothing is requested
    pub smoothing_window_meters: f64,
    pub request_timeout: Duration,
    pub tile_url: String,
}

impl Default for TerrainConfig {
    fn default() -> Self {
        TerrainConfig {
            zoom_level: 12,
            cache_dir: PathBuf::from("srtm_cache"),
            max_requests_per_second: 50,
            smoothing_window_meters: 150.0,
            request_timeout: Duration::from_secs(30),
            tile_url: "https://s3.amazonaws.com/elevation-tiles-prod/terrarium".to_string(),
        }
    }
}

#[derive(Debug, Clone, Copy, Hash, PartialEq, Eq)]
struct TileKey {
    z: u8,
    x: u32,
    y: u32,
}

impl TileKey {
    fn cache_filename(&self) -> String {
        format!("tile_z{}_x{}_y{}.png", self.z, self.x, self.y)
    }
}

pub struct TerrainTileProvider {
    config: TerrainConfig,
    client: Client,
    /// `None` marks a tile the server has no data for
    memory_cache: HashMap<TileKey, Option<RgbImage>>,
    last_request_time: Instant,
    min_request_interval: Duration,
    request_count: u32,
}

impl TerrainTileProvider {
    pub fn new(config: TerrainConfig) -> Result<Self, ElevationError> {
        fs::create_dir_all(&config.cache_dir)?;

        let client = Client::builder().timeout(config.request_timeout).build()?;
        let min_request_interval =
            Duration::from_nanos(1_000_000_000 / config.max_requests_per_second.max(1) as u64);

        info!(
            cache_dir = %config.cache_dir.display(),
            zoom = config.zoom_level,
            "opened terrain tile provider"
        );

        Ok(TerrainTileProvider {
            config,
            client,
            memory_cache: HashMap::new(),
            last_request_time: Instant::now() - Duration::from_secs(1),
            min_request_interval,
            request_count: 0,
        })
    }

    fn tile(&mut self, key: TileKey) -> Result<Option<&RgbImage>, ElevationError> {
        if !self.memory_cache.contains_key(&key) {
            let tile = self.load_tile(key)?;
            self.memory_cache.insert(key, tile);
        }
        Ok(self.memory_cache.get(&key).and_then(|tile| tile.as_ref()))
    }

    fn load_tile(&mut self, key: TileKey) -> Result<Option<RgbImage>, ElevationError> {
        let cache_path = self.config.cache_dir.join(key.cache_filename());
        if cache_path.exists() {
            let bytes = fs::read(&cache_path)?;
            match image::load_from_memory_with_format(&bytes, ImageFormat::Png) {
                Ok(img) if img.width() == TILE_SIZE && img.height() == TILE_SIZE => {
                    return Ok(Some(img.to_rgb8()));
                }
                Ok(img) => {
                    warn!(
                        path = %cache_path.display(),
                        width = img.width(),
                        height = img.height(),
                        "discarding cached tile with wrong size"
                    );
                    let _ = fs::remove_file(&cache_path);
                }
                Err(e) => {
                    warn!(path = %cache_path.display(), error = %e, "discarding corrupted cached tile");
                    let _ = fs::remove_file(&cache_path);
                }
            }
        }

        self.apply_rate_limiting();

        let url = format!("{}/{}/{}/{}.png", self.config.tile_url, key.z, key.x, key.y);
        debug!(z = key.z, x = key.x, y = key.y, "fetching tile");

        let response = self.client.get(&url).send().map_err(classify)?;
        let status = response.status();
        if status == StatusCode::NOT_FOUND {
            return Ok(None);
        }
        if !status.is_success() {
            return Err(ElevationError::Status {
                url,
                status: status.as_u16(),
            });
        }

        let bytes = response.bytes().map_err(classify)?;
        let img = image::load_from_memory_with_format(&bytes, ImageFormat::Png)?.to_rgb8();
        if img.dimensions() != (TILE_SIZE, TILE_SIZE) {
            return Err(ElevationError::TileSize {
                url,
                width: img.width(),
                height: img.height(),
            });
        }

        if let Err(e) = fs::write(&cache_path, &bytes) {
            warn!(path = %cache_path.display(), error = %e, "failed to save tile to cache");
        }

        Ok(Some(img))
    }

    fn apply_rate_limiting(&mut self) {
        let time_since_last = self.last_request_time.elapsed();
        if time_since_last < self.min_request_interval {
            thread::sleep(self.min_request_interval - time_since_last);
        }

        self.last_request_time = Instant::now();
        self.request_count += 1;

        if self.request_count % 100 == 0 {
            debug!(requests = self.request_count, "tile requests so far");
        }
    }

    fn lookup(&mut self, lat: f64, lon: f64) -> Result<Option<f64>, ElevationError> {
        let zoom = self.config.zoom_level;
        let (x, y, xpixel, ypixel) = latlon_to_tile_coords(lat, lon, zoom);
        let key = TileKey { z: zoom, x, y };
        Ok(self
            .tile(key)?
            .map(|img| extract_terrarium_elevation(img, xpixel, ypixel)))
    }
}

impl ElevationProvider for TerrainTileProvider {
    fn add_elevations(&mut self, route: &mut Route, smooth: bool) -> Result<(), ElevationError> {
        // Every lookup happens before any point is touched, so a failed
        // attempt leaves the route as it was.
        debug!(points = route.point_count(), smooth, "looking up elevations");
        let mut per_segment = Vec::new();
        for segment in route.segments() {
            let mut elevations = Vec::with_capacity(segment.len());
            for waypoint in segment {
                let p = waypoint.point();
                elevations.push(self.lookup(p.y(), p.x())?);
            }
            if smooth {
                let distances = cumulative_distances(segment);
                elevations = rolling_distance_smooth(
                    &distances,
                    &elevations,
                    self.config.smoothing_window_meters,
                );
            }
            per_segment.push(elevations);
        }

        for (segment, elevations) in route.segments_mut().zip(per_segment) {
            for (waypoint, elevation) in segment.iter_mut().zip(elevations) {
                waypoint.elevation = elevation;
            }
        }
        Ok(())
    }
}

/// Timeouts are the only transport error the enricher retries.
fn classify(err: reqwest::Error) -> ElevationError {
    if err.is_timeout() {
        ElevationError::Timeout(err.to_string())
    } else {
        ElevationError::Http(err)
    }
}

/// Convert lat/lon to tile coordinates plus the pixel inside the 256x256 tile
fn latlon_to_tile_coords(lat: f64, lon: f64, zoom: u8) -> (u32, u32, u32, u32) {
    let n = 2_f64.powi(zoom as i32);
    let lat_rad = lat.to_radians();

    let x = (lon + 180.0) / 360.0 * n;
    let y = (1.0 - lat_rad.tan().asinh() / std::f64::consts::PI) / 2.0 * n;
    let max_tile = n - 1.0;
    let xtile = x.clamp(0.0, max_tile) as u32;
    let ytile = y.clamp(0.0, max_tile) as u32;

    let tile_size = TILE_SIZE as f64;
    let xpixel = ((x - xtile as f64) * tile_size) as u32;
    let ypixel = ((y - ytile as f64) * tile_size) as u32;

    (xtile, ytile, xpixel.min(TILE_SIZE - 1), ypixel.min(TILE_SIZE - 1))
}

/// Terrarium encoding: elevation = (R * 256 + G + B/256) - 32768
fn extract_terrarium_elevation(img: &RgbImage, x: u32, y: u32) -> f64 {
    let [r, g, b] = img.get_pixel(x, y).0;
    (r as u32 * 256 + g as u32) as f64 + (b as f64 / 256.0) - 32768.0
}

pub(crate) fn cumulative_distances(points: &[Waypoint]) -> Vec<f64> {
    let mut distances = Vec::with_capacity(points.len());
    let mut total = 0.0;
    for (i, waypoint) in points.iter().enumerate() {
        if i > 0 {
            let prev = points[i - 1].point();
            let curr = waypoint.point();
            let a = point!(x: prev.x(), y: prev.y());
            let b = point!(x: curr.x(), y: curr.y());
            total += a.haversine_distance(&b);
        }
        distances.push(total);
    }
    distances
}

/// Rolling distance-based smoothing; points without elevation are left
/// empty and do not contribute to their neighbours.
fn rolling_distance_smooth(
    distances: &[f64],
    elevations: &[Option<f64>],
    window_meters: f64,
) -> Vec<Option<f64>> {
    if elevations.len() < 3 || window_meters <= 0.0 {
        return elevations.to_vec();
    }

    let half_window = window_meters / 2.0;
    let mut smoothed = Vec::with_capacity(elevations.len());
    let mut lo = 0;
    let mut hi = 0;

    for i in 0..elevations.len() {
        let current_dist = distances[i];
        while current_dist - distances[lo] > half_window {
            lo += 1;
        }
        while hi + 1 < elevations.len() && distances[hi + 1] - current_dist <= half_window {
            hi += 1;
        }

        if elevations[i].is_none() {
            smoothed.push(None);
            continue;
        }

        let mut weighted_sum = 0.0;
        let mut weight_sum = 0.0;
        for j in lo..=hi {
            if let Some(elevation) = elevations[j] {
                let dist_diff = (distances[j] - current_dist).abs();
                let weight = 1.0 / (1.0 + dist_diff / 20.0);
                weighted_sum += elevation * weight;
                weight_sum += weight;
            }
        }
        smoothed.push(Some(weighted_sum / weight_sum));
    }

    smoothed
}
