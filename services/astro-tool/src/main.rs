//! astro-tool: inspect spectral-line cubes from the command line.

use std::fs;
use std::path::PathBuf;

use anyhow::{bail, Context, Result};
use astro_tool::commands::{self, Direction, SliceRequest, WcsRequest};
use astro_tool::{load_header, load_volume, ByteOrder};
use clap::{Parser, Subcommand, ValueEnum};
use pv_slice::SliceConfig;
use tracing::{debug, Level};
use tracing_subscriber::FmtSubscriber;
use volume_stats::StatsConfig;
use wcs::{AxisRole, DisplayConfig, SpectralConvention};

#[derive(Parser, Debug)]
#[command(name = "astro-tool")]
#[command(about = "WCS, statistics and PV slice geometry for spectral-line cubes")]
struct Cli {
    /// Log level
    #[arg(long, env = "ASTRO_LOG_LEVEL", default_value = "warn")]
    log_level: String,

    /// Emit logs as JSON
    #[arg(long)]
    json_logs: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Convert a pixel position to world coordinates, or back
    Wcs {
        /// Header file (JSON, YAML or FITS cards)
        #[arg(long)]
        header: PathBuf,

        /// Three comma-separated coordinates
        #[arg(long, value_delimiter = ',', allow_hyphen_values = true)]
        coords: Vec<f64>,

        /// Treat the coordinates as world values
        #[arg(long)]
        inverse: bool,

        /// Reinterpret the spectral axis first
        #[arg(long, value_enum)]
        convention: Option<ConventionArg>,

        /// Decimals on the last displayed component
        #[arg(long, default_value = "2")]
        precision: usize,

        /// YAML file with display preferences
        #[arg(long)]
        display: Option<PathBuf>,
    },

    /// Print the axes of a header and whether its WCS is usable
    Describe {
        #[arg(long)]
        header: PathBuf,
    },

    /// Pick a tick step for a world span
    Ticks {
        #[arg(long)]
        header: PathBuf,

        #[arg(long, value_enum, default_value = "x")]
        axis: AxisArg,

        /// World value at the start of the span
        #[arg(long, allow_hyphen_values = true)]
        from: f64,

        /// World value at the end of the span
        #[arg(long, allow_hyphen_values = true)]
        to: f64,

        /// Desired number of ticks
        #[arg(long, default_value = "5")]
        count: usize,
    },

    /// Compute data range, noise and display threshold
    Stats {
        #[command(flatten)]
        cube: CubeArgs,
    },

    /// Synchronize a ruler with the PV slice and print the geometry
    Slice {
        #[command(flatten)]
        cube: CubeArgs,

        /// Ruler endpoints in world coordinates: x1,y1,z1,x2,y2,z2
        #[arg(long, value_delimiter = ',', allow_hyphen_values = true)]
        ruler: Option<Vec<f64>>,

        /// Slice angle in degrees
        #[arg(long, allow_hyphen_values = true)]
        angle: Option<f64>,

        #[arg(long, allow_hyphen_values = true)]
        shift_x: Option<f64>,

        #[arg(long, allow_hyphen_values = true)]
        shift_y: Option<f64>,

        /// Header of a moment map whose centre becomes the pivot
        #[arg(long, requires = "moment_data")]
        moment_header: Option<PathBuf>,

        /// Raw data of the moment map
        #[arg(long, requires = "moment_header")]
        moment_data: Option<PathBuf>,
    },
}

#[derive(clap::Args, Debug)]
struct CubeArgs {
    /// Header file (JSON, YAML or FITS cards)
    #[arg(long)]
    header: PathBuf,

    /// Raw voxel data
    #[arg(long)]
    data: PathBuf,

    /// Data type, overriding BITPIX (uint8, int16, int32, float32, float64)
    #[arg(long)]
    dtype: Option<String>,

    /// Data file is big-endian
    #[arg(long)]
    big_endian: bool,
}

impl CubeArgs {
    fn byte_order(&self) -> ByteOrder {
        if self.big_endian {
            ByteOrder::BigEndian
        } else {
            ByteOrder::Native
        }
    }
}

#[derive(ValueEnum, Clone, Copy, Debug)]
enum ConventionArg {
    Radio,
    Optical,
    Frequency,
}

impl From<ConventionArg> for SpectralConvention {
    fn from(arg: ConventionArg) -> Self {
        match arg {
            ConventionArg::Radio => SpectralConvention::RadioVelocity,
            ConventionArg::Optical => SpectralConvention::OpticalVelocity,
            ConventionArg::Frequency => SpectralConvention::Frequency,
        }
    }
}

#[derive(ValueEnum, Clone, Copy, Debug)]
enum AxisArg {
    X,
    Y,
    Z,
}

impl From<AxisArg> for AxisRole {
    fn from(arg: AxisArg) -> Self {
        match arg {
            AxisArg::X => AxisRole::X,
            AxisArg::Y => AxisRole::Y,
            AxisArg::Z => AxisRole::Z,
        }
    }
}

fn triple(values: &[f64], what: &str) -> Result<[f64; 3]> {
    match values {
        [a, b, c] => Ok([*a, *b, *c]),
        _ => bail!("{} needs 3 values, got {}", what, values.len()),
    }
}

fn init_tracing(log_level: &str, json: bool) -> Result<()> {
    let level = match log_level.to_lowercase().as_str() {
        "trace" => Level::TRACE,
        "debug" => Level::DEBUG,
        "info" => Level::INFO,
        "error" => Level::ERROR,
        _ => Level::WARN,
    };

    let builder = FmtSubscriber::builder()
        .with_max_level(level)
        .with_writer(std::io::stderr);
    if json {
        tracing::subscriber::set_global_default(builder.json().finish())?;
    } else {
        tracing::subscriber::set_global_default(builder.finish())?;
    }
    Ok(())
}

fn run(command: Commands) -> Result<String> {
    match command {
        Commands::Wcs {
            header,
            coords,
            inverse,
            convention,
            precision,
            display,
        } => {
            let display = match display {
                Some(path) => {
                    let text = fs::read_to_string(&path)
                        .with_context(|| format!("reading {}", path.display()))?;
                    let config: DisplayConfig = serde_yaml::from_str(&text)
                        .with_context(|| format!("parsing {}", path.display()))?;
                    Some(config)
                }
                None => None,
            };
            let request = WcsRequest {
                coords: triple(&coords, "--coords")?,
                direction: if inverse {
                    Direction::ToPixel
                } else {
                    Direction::ToWorld
                },
                convention: convention.map(SpectralConvention::from),
                precision,
                display,
            };
            commands::run_wcs(&load_header(&header)?, &request)
        }
        Commands::Describe { header } => commands::run_describe(&load_header(&header)?),
        Commands::Ticks {
            header,
            axis,
            from,
            to,
            count,
        } => commands::run_ticks(&load_header(&header)?, axis.into(), from, to, count),
        Commands::Stats { cube } => {
            let config = StatsConfig::from_env();
            config.validate().map_err(anyhow::Error::msg)?;
            let mut volume =
                load_volume(&cube.header, &cube.data, cube.dtype.as_deref(), cube.byte_order())?;
            commands::run_stats(&mut volume, &config)
        }
        Commands::Slice {
            cube,
            ruler,
            angle,
            shift_x,
            shift_y,
            moment_header,
            moment_data,
        } => {
            let ruler = match ruler {
                Some(values) if values.len() == 6 => Some([
                    triple(&values[..3], "--ruler")?,
                    triple(&values[3..], "--ruler")?,
                ]),
                Some(values) => bail!("--ruler needs 6 values, got {}", values.len()),
                None => None,
            };
            let volume =
                load_volume(&cube.header, &cube.data, cube.dtype.as_deref(), cube.byte_order())?;
            let moment_map = match (moment_header, moment_data) {
                (Some(header), Some(data)) => {
                    Some(load_volume(&header, &data, None, cube.byte_order())?)
                }
                _ => None,
            };
            let request = SliceRequest {
                ruler,
                angle,
                shift_x,
                shift_y,
            };
            commands::run_slice(volume, moment_map, &request, SliceConfig::from_env())
        }
    }
}

fn main() -> Result<()> {
    // Load environment variables from .env file
    dotenvy::dotenv().ok();

    let cli = Cli::parse();
    init_tracing(&cli.log_level, cli.json_logs)?;
    debug!(command = ?cli.command, "Starting astro-tool");

    let output = run(cli.command)?;
    println!("{}", output);
    Ok(())
}
