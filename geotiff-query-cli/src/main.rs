use anyhow::{Context, Result};
use clap::Parser;
use geotiff_query::{QueryConfig, RasterQuery, RasterSource, TargetSrs};
use rayon::ThreadPoolBuilder;
use std::fs;
use std::path::{Path, PathBuf};
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Raster file (any format GDAL can open)
    #[arg(value_name = "RASTER")]
    raster: PathBuf,

    /// X / longitude in the source coordinate system
    #[arg(value_name = "LON", allow_negative_numbers = true, required_unless_present = "points")]
    lon: Option<f64>,

    /// Y / latitude in the source coordinate system
    #[arg(value_name = "LAT", allow_negative_numbers = true, required_unless_present = "points")]
    lat: Option<f64>,

    /// Coordinate system of the input coordinates
    #[arg(long, value_name = "SRS", default_value = geotiff_query::query::DEFAULT_SOURCE_SRS)]
    source_srs: String,

    /// Always treat the raster as being in this system, ignoring its metadata
    #[arg(long, value_name = "SRS", conflicts_with_all = ["fallback_srs", "no_fallback"])]
    target_srs: Option<String>,

    /// System assumed when the raster carries none
    #[arg(long, value_name = "SRS", default_value = geotiff_query::query::DEFAULT_TARGET_SRS)]
    fallback_srs: String,

    /// Use coordinates as given when the raster carries no system
    #[arg(long)]
    no_fallback: bool,

    /// Band to read (1-based)
    #[arg(short, long, default_value_t = 1)]
    band: usize,

    /// Keep the authority's axis order (e.g. lat/lon for EPSG:4326)
    #[arg(long)]
    authority_axis_order: bool,

    /// File with one "x y" or "x,y" pair per line
    #[arg(short, long, value_name = "FILE", conflicts_with_all = ["lon", "lat"])]
    points: Option<PathBuf>,

    /// Run every point as an independent query on the thread pool
    #[arg(long)]
    parallel: bool,

    /// Worker threads for --parallel (default: number of CPU cores)
    #[arg(short, long, requires = "parallel")]
    threads: Option<usize>,

    /// Print the pixel/line instead of the value
    #[arg(long, conflicts_with = "verbose")]
    pixel: bool,

    /// Also print the sampled pixel/line and the georeferenced origin of that cell
    #[arg(short, long)]
    verbose: bool,
}

/// What to print for each point.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Report {
    Value,
    Pixel,
    Verbose,
}

impl Args {
    fn config(&self) -> QueryConfig {
        let target_srs = match &self.target_srs {
            Some(definition) => TargetSrs::Fixed(definition.clone()),
            None => TargetSrs::Embedded {
                fallback: (!self.no_fallback).then(|| self.fallback_srs.clone()),
            },
        };
        QueryConfig::default()
            .with_source_srs(self.source_srs.clone())
            .with_target_srs(target_srs)
            .with_band(self.band)
            .with_traditional_axis_order(!self.authority_axis_order)
    }

    fn report(&self) -> Report {
        if self.pixel {
            Report::Pixel
        } else if self.verbose {
            Report::Verbose
        } else {
            Report::Value
        }
    }
}

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_writer(std::io::stderr)
        .init();

    let args = Args::parse();
    let config = args.config();

    if let Some(threads) = args.threads {
        ThreadPoolBuilder::new()
            .num_threads(threads)
            .build_global()
            .context("Failed to build thread pool")?;
    }

    match (&args.points, args.lon, args.lat) {
        (Some(points_path), _, _) => {
            let points = read_points(points_path)?;
            info!("Querying {} points in {:?}", points.len(), args.raster);
            query_points(&args, &config, &points)
        }
        (None, Some(x), Some(y)) => {
            let query = RasterQuery::open(&args.raster, &config)
                .with_context(|| format!("Failed to prepare query on {:?}", args.raster))?;
            let output = evaluate(&query, x, y, args.report())
                .with_context(|| format!("Failed to query ({}, {})", x, y))?;
            println!("{}", output);
            Ok(())
        }
        _ => anyhow::bail!("Either LON LAT or --points must be given"),
    }
}

fn evaluate(query: &RasterQuery, x: f64, y: f64, report: Report) -> geotiff_query::Result<String> {
    match report {
        Report::Value => query.value(x, y).map(|value| value.to_string()),
        Report::Pixel => {
            let p = query.pixel(x, y)?;
            Ok(format!("{} {}", p.pixel, p.line))
        }
        Report::Verbose => {
            let p = query.pixel(x, y)?;
            let value = query.value(x, y)?;
            let (origin_x, origin_y) = query
                .raster()
                .geo_transform()?
                .apply(p.pixel as f64, p.line as f64);
            Ok(format!(
                "{} (pixel {} {}, origin {} {})",
                value, p.pixel, p.line, origin_x, origin_y
            ))
        }
    }
}

fn query_points(args: &Args, config: &QueryConfig, points: &[(f64, f64)]) -> Result<()> {
    let results: Vec<geotiff_query::Result<String>> = if args.parallel {
        use rayon::prelude::*;

        // Each point gets its own dataset, SRS and transform
        points
            .par_iter()
            .map(|&(x, y)| {
                let query = RasterQuery::open(&args.raster, config)?;
                evaluate(&query, x, y, args.report())
            })
            .collect()
    } else {
        let query = RasterQuery::open(&args.raster, config)
            .with_context(|| format!("Failed to prepare query on {:?}", args.raster))?;
        points
            .iter()
            .map(|&(x, y)| evaluate(&query, x, y, args.report()))
            .collect()
    };

    let mut failures = 0;
    for (&(x, y), result) in points.iter().zip(results) {
        match result {
            Ok(output) => println!("{} {} {}", x, y, output),
            Err(e) => {
                failures += 1;
                error!("({}, {}): {}", x, y, e);
                println!("{} {} error", x, y);
            }
        }
    }

    if failures > 0 {
        anyhow::bail!("{} of {} points failed", failures, points.len());
    }
    Ok(())
}

fn read_points(path: &Path) -> Result<Vec<(f64, f64)>> {
    let content =
        fs::read_to_string(path).with_context(|| format!("Failed to read points file {:?}", path))?;
    parse_points(&content).with_context(|| format!("Invalid points file {:?}", path))
}

fn parse_points(content: &str) -> Result<Vec<(f64, f64)>> {
    let mut points = Vec::new();
    for (number, line) in content.lines().enumerate() {
        let line = line.split('#').next().unwrap_or("").trim();
        if line.is_empty() {
            continue;
        }

        let fields: Vec<&str> = line
            .split(|c: char| c == ',' || c.is_whitespace())
            .filter(|field| !field.is_empty())
            .collect();
        let [x, y] = fields.as_slice() else {
            anyhow::bail!("line {}: expected two coordinates, got {:?}", number + 1, line);
        };
        let x: f64 = x
            .parse()
            .with_context(|| format!("line {}: invalid x {:?}", number + 1, x))?;
        let y: f64 = y
            .parse()
            .with_context(|| format!("line {}: invalid y {:?}", number + 1, y))?;
        points.push((x, y));
    }
    Ok(points)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_points() {
        let content = "# lon lat\n24.94 60.17\n\n27.0,65.0\n  -3.5 , 40.4  # Madrid\n";
        let points = parse_points(content).unwrap();
        assert_eq!(points, vec![(24.94, 60.17), (27.0, 65.0), (-3.5, 40.4)]);
    }

    #[test]
    fn test_parse_points_rejects_bad_lines() {
        assert!(parse_points("1.0\n").is_err());
        assert!(parse_points("1.0 2.0 3.0\n").is_err());
        assert!(parse_points("east north\n").is_err());
    }

    #[test]
    fn test_config_from_args() {
        let args = Args::parse_from(["geotiff-query", "dem.tif", "24.9", "60.2"]);
        let config = args.config();
        assert_eq!(config.source_srs, "WGS84");
        assert_eq!(
            config.target_srs,
            TargetSrs::Embedded {
                fallback: Some("EPSG:3067".to_string())
            }
        );
        assert!(config.traditional_axis_order);

        let args = Args::parse_from([
            "geotiff-query",
            "dem.tif",
            "--target-srs",
            "EPSG:32635",
            "--band",
            "2",
            "--",
            "-3.5",
            "40.4",
        ]);
        let config = args.config();
        assert_eq!(config.target_srs, TargetSrs::Fixed("EPSG:32635".to_string()));
        assert_eq!(config.band, 2);
        assert_eq!(args.lon, Some(-3.5));

        let args = Args::parse_from(["geotiff-query", "dem.tif", "--no-fallback", "--points", "p.txt"]);
        assert_eq!(args.config().target_srs, TargetSrs::Embedded { fallback: None });
    }

    #[test]
    fn test_coordinates_required_without_points() {
        assert!(Args::try_parse_from(["geotiff-query", "dem.tif"]).is_err());
    }

    #[test]
    fn test_threads_require_parallel() {
        let args = ["geotiff-query", "dem.tif", "--points", "p.txt", "--threads", "4"];
        assert!(Args::try_parse_from(args).is_err());

        let args = Args::try_parse_from([
            "geotiff-query",
            "dem.tif",
            "--points",
            "p.txt",
            "--parallel",
            "--threads",
            "4",
        ])
        .unwrap();
        assert_eq!(args.threads, Some(4));
    }

    #[test]
    fn test_report_modes() {
        let args = Args::parse_from(["geotiff-query", "dem.tif", "24.9", "60.2"]);
        assert_eq!(args.report(), Report::Value);

        let args = Args::parse_from(["geotiff-query", "-v", "dem.tif", "24.9", "60.2"]);
        assert_eq!(args.report(), Report::Verbose);

        let args = Args::parse_from(["geotiff-query", "--pixel", "dem.tif", "24.9", "60.2"]);
        assert_eq!(args.report(), Report::Pixel);

        assert!(Args::try_parse_from(["geotiff-query", "--pixel", "-v", "dem.tif", "1", "2"]).is_err());
    }

    #[test]
    fn test_verbose_reports_cell_origin() {
        use gdal::raster::Buffer;
        use gdal::DriverManager;
        use geotiff_query::GdalRaster;

        geotiff_query::env::ensure_initialized();
        let driver = DriverManager::get_driver_by_name("MEM").unwrap();
        let mut dataset = driver
            .create_with_band_type::<f64, _>("", 4, 4, 1)
            .unwrap();
        dataset
            .set_geo_transform(&[100.0, 10.0, 0.0, 40.0, 0.0, -10.0])
            .unwrap();
        {
            let mut band = dataset.rasterband(1).unwrap();
            let mut buffer = Buffer::new((4, 4), vec![42.0; 16]);
            band.write((0, 0), (4, 4), &mut buffer).unwrap();
        }

        let config = QueryConfig::default()
            .with_source_srs("EPSG:3067")
            .with_target_srs(TargetSrs::Fixed("EPSG:3067".to_string()));
        let query = RasterQuery::new(GdalRaster::from_dataset(dataset, "mem"), &config).unwrap();

        let output = evaluate(&query, 125.0, 15.0, Report::Verbose).unwrap();
        assert_eq!(output, "42 (pixel 2 2, origin 120 20)");
        assert_eq!(evaluate(&query, 125.0, 15.0, Report::Pixel).unwrap(), "2 2");
        assert_eq!(evaluate(&query, 125.0, 15.0, Report::Value).unwrap(), "42");
    }
}
