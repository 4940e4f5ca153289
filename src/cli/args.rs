use clap::{Args, Parser, Subcommand};
use std::path::PathBuf;

#[derive(Parser)]
#[command(name = "era5-processor")]
#[command(about = "Area-weighted daily ERA5 summaries for administrative regions")]
#[command(version)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,

    #[arg(short, long, global = true, help = "Enable verbose logging")]
    pub verbose: bool,

    #[arg(long, global = true, help = "Log file path")]
    pub log_file: Option<PathBuf>,

    #[arg(short, long, global = true, help = "Hide progress bars")]
    pub quiet: bool,

    #[arg(short, long, global = true, help = "Settings file (TOML, JSON or YAML)")]
    pub config: Option<PathBuf>,
}

/// Input overrides shared by every command. Anything left unset falls back
/// to the settings file, then the environment, then the built-in defaults.
#[derive(Args, Debug, Clone, Default)]
pub struct InputArgs {
    #[arg(short, long, help = "GeoJSON file of region polygons")]
    pub regions: Option<PathBuf>,

    #[arg(long, help = "Property holding the region identifier")]
    pub id_field: Option<String>,

    #[arg(long, help = "Grid resolution in degrees")]
    pub resolution: Option<f64>,

    #[arg(long, help = "Matching tolerance in degrees")]
    pub tolerance: Option<f64>,

    #[arg(long, help = "Worker threads [default: number of CPUs]")]
    pub max_workers: Option<usize>,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Aggregate every configured year into one summary CSV
    Summarize {
        #[command(flatten)]
        input: InputArgs,

        #[arg(short = 'd', long, help = "Directory holding the yearly reading tables")]
        readings_dir: Option<PathBuf>,

        #[arg(long, help = "Year table file name, {year} is substituted")]
        readings_pattern: Option<String>,

        #[arg(short, long, help = "Summary CSV to create")]
        output: Option<PathBuf>,

        #[arg(short, long, value_delimiter = ',', help = "Years to process, e.g. 2020,2021")]
        years: Vec<i32>,

        #[arg(long, help = "Weight normalization: region_area or coverage")]
        normalization: Option<String>,

        #[arg(long, help = "Memory-map the reading tables")]
        use_mmap: bool,
    },

    /// Build the region weight index and write it as CSV
    Weights {
        #[command(flatten)]
        input: InputArgs,

        #[arg(short, long, help = "Weight CSV to create [default: next to the summary output]")]
        output: Option<PathBuf>,
    },

    /// Check regions and year tables without aggregating
    Validate {
        #[command(flatten)]
        input: InputArgs,

        #[arg(short = 'd', long, help = "Directory holding the yearly reading tables")]
        readings_dir: Option<PathBuf>,

        #[arg(long, help = "Year table file name, {year} is substituted")]
        readings_pattern: Option<String>,

        #[arg(short, long, value_delimiter = ',', help = "Years to check")]
        years: Vec<i32>,
    },
}
