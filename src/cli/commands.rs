use crate::cli::args::{Cli, Commands, InputArgs};
use crate::config::{Settings, WeightNormalization};
use crate::error::{ProcessingError, Result};
use crate::processors::ParallelProcessor;
use crate::utils::filename::default_weights_filename;
use crate::writers::WeightWriter;
use std::path::PathBuf;
use tracing::info;

pub async fn run(cli: Cli) -> Result<()> {
    let mut settings = Settings::load(cli.config.as_deref())?;
    let show_progress = !cli.quiet;

    match cli.command {
        Commands::Summarize {
            input,
            readings_dir,
            readings_pattern,
            output,
            years,
            normalization,
            use_mmap,
        } => {
            apply_input(&mut settings, input);
            apply_readings(&mut settings, readings_dir, readings_pattern, years);
            if let Some(output) = output {
                settings.paths.output = output;
            }
            if let Some(name) = normalization {
                settings.normalization = WeightNormalization::parse(&name).ok_or_else(|| {
                    ProcessingError::Config(format!("Unknown normalization: {}", name))
                })?;
            }
            settings.use_mmap |= use_mmap;
            settings.check()?;

            println!("Summarizing ERA5 readings...");
            println!("Regions: {}", settings.paths.regions.display());
            println!("Readings: {}", settings.paths.readings_dir.display());
            println!("Output file: {}", settings.paths.output.display());
            println!(
                "Years: {:?}, Workers: {}, Normalization: {}",
                settings.years,
                settings.max_workers,
                settings.normalization.as_str()
            );

            let processor = ParallelProcessor::from_settings(&settings).with_progress(show_progress);
            let stats = processor.run(&settings).await?;

            println!("\n{}", stats.summary());
            if stats.skipped_rows() > 0 {
                println!("⚠️  Skipped {} unusable reading rows", stats.skipped_rows());
            }
            println!("Processing complete!");
        }

        Commands::Weights { input, output } => {
            apply_input(&mut settings, input);
            settings.check()?;

            let output = output.unwrap_or_else(|| default_weights_filename(&settings.paths.output));
            println!("Building region weight index...");
            println!("Regions: {}", settings.paths.regions.display());

            let processor = ParallelProcessor::from_settings(&settings).with_progress(show_progress);
            let (rows, regions, dropped) =
                write_weights(processor, settings, output.clone()).await?;

            println!(
                "Indexed {} regions ({} without grid overlap)",
                regions, dropped
            );
            println!("Wrote {} weight rows to {}", rows, output.display());
        }

        Commands::Validate {
            input,
            readings_dir,
            readings_pattern,
            years,
        } => {
            apply_input(&mut settings, input);
            apply_readings(&mut settings, readings_dir, readings_pattern, years);
            settings.check()?;

            println!("Validating inputs...");
            let processor = ParallelProcessor::from_settings(&settings).with_progress(show_progress);
            let report =
                tokio::task::spawn_blocking(move || processor.validate_inputs(&settings)).await??;

            println!("\n{}", report.summary());
            if report.is_ok() {
                println!("✅ All inputs passed validation checks");
            } else {
                return Err(ProcessingError::Config(
                    "input validation failed".to_string(),
                ));
            }
        }
    }

    Ok(())
}

async fn write_weights(
    processor: ParallelProcessor,
    settings: Settings,
    output: PathBuf,
) -> Result<(usize, usize, usize)> {
    tokio::task::spawn_blocking(move || {
        let (_, index) = processor.build_index(&settings)?;
        let rows = WeightWriter::write_path(&output, index.iter())?;
        info!(rows, path = %output.display(), "Wrote weight index");
        Ok((rows, index.len(), index.dropped().len()))
    })
    .await?
}

fn apply_input(settings: &mut Settings, input: InputArgs) {
    if let Some(regions) = input.regions {
        settings.paths.regions = regions;
    }
    if let Some(id_field) = input.id_field {
        settings.region_id_field = id_field;
    }
    if let Some(resolution) = input.resolution {
        settings.grid.resolution = resolution;
    }
    if let Some(tolerance) = input.tolerance {
        settings.grid.tolerance = tolerance;
    }
    if let Some(max_workers) = input.max_workers {
        settings.max_workers = max_workers;
    }
}

fn apply_readings(
    settings: &mut Settings,
    readings_dir: Option<PathBuf>,
    readings_pattern: Option<String>,
    years: Vec<i32>,
) {
    if let Some(dir) = readings_dir {
        settings.paths.readings_dir = dir;
    }
    if let Some(pattern) = readings_pattern {
        settings.paths.readings_pattern = pattern;
    }
    if !years.is_empty() {
        settings.years = years;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cli_overrides_settings() {
        let mut settings = Settings::default();
        apply_input(
            &mut settings,
            InputArgs {
                regions: Some(PathBuf::from("regions.geojson")),
                tolerance: Some(0.02),
                max_workers: Some(2),
                ..Default::default()
            },
        );
        apply_readings(&mut settings, None, None, vec![2022]);

        assert_eq!(settings.paths.regions, PathBuf::from("regions.geojson"));
        assert_eq!(settings.grid.tolerance, 0.02);
        assert_eq!(settings.max_workers, 2);
        assert_eq!(settings.years, vec![2022]);
        // Untouched values keep their defaults
        assert_eq!(settings.grid.resolution, 0.1);
        assert_eq!(settings.paths.readings_pattern, "multivariable_export_{year}.csv");
    }

    #[test]
    fn test_empty_years_keep_configured_years() {
        let mut settings = Settings::default();
        let configured = settings.years.clone();
        apply_readings(&mut settings, None, None, Vec::new());
        assert_eq!(settings.years, configured);
    }
}
