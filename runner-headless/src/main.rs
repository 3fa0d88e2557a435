use clap::{Parser, Subcommand};
use fire_model_core::landscape::LandscapeInfo;
use fire_model_core::{
    build_landscape, execute_run, input_file_path, write_input_file, FireModelError,
    LandscapeSources, ModelVariant, ParameterSet, ProcessResult, ProcessSupervisor, RunDefinition,
    SimulatorRegistry,
};
use std::path::PathBuf;
use std::process::ExitCode;
use tracing::error;
use tracing_subscriber::EnvFilter;

/// Command line driver for the `FlamMap` family of fire simulators
#[derive(Parser, Debug)]
#[command(name = "fire-model-run")]
#[command(about = "Prepare inputs for and run FlamMap, MTT, TOM and Farsite", long_about = None)]
struct Args {
    /// Simulator registry (TOML with a [simulators] table)
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    /// Directory holding the bundled `TestFlamMap`, `TestMTT` and `TestFARSITE` binaries
    #[arg(long, global = true)]
    bin_dir: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Stack eight rasters into a landscape container
    Landscape {
        /// Output container (.tif)
        #[arg(short, long)]
        out: PathBuf,

        /// Rasters in band order: `elev slope aspect fbfm cnpy_cvr cnpy_ht cbh cbd`
        #[arg(num_args = 8, required = true)]
        sources: Vec<PathBuf>,
    },
    /// Print the layout and band statistics of a landscape container
    Inspect { landscape: PathBuf },
    /// Write an inputs file from a TOML parameter set
    Input {
        #[arg(short, long)]
        params: PathBuf,

        /// Overrides the variant named in the parameter file
        #[arg(short, long)]
        variant: Option<ModelVariant>,

        #[arg(short, long, default_value = ".")]
        out_dir: PathBuf,

        #[arg(short, long, default_value = "run")]
        name: String,
    },
    /// Execute a run definition end to end
    Run {
        #[arg(short, long)]
        definition: PathBuf,
    },
    /// Run the first command file of a simulator's sample data directory
    Sample {
        #[arg(short, long)]
        variant: ModelVariant,

        dir: PathBuf,
    },
}

fn main() -> ExitCode {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let args = Args::parse();
    match dispatch(args) {
        Ok(code) => code,
        Err(e) => {
            error!("{e}");
            ExitCode::FAILURE
        }
    }
}

fn dispatch(args: Args) -> Result<ExitCode, FireModelError> {
    match args.command {
        Commands::Landscape { out, sources } => {
            let sources: [PathBuf; 8] = sources
                .try_into()
                .map_err(|_| FireModelError::Config("expected eight source rasters".into()))?;
            let summary = build_landscape(LandscapeSources::from_ordered(sources), out)?;
            println!(
                "Wrote {} ({}x{})",
                summary.path.display(),
                summary.width,
                summary.height
            );
            for (role, stats) in &summary.bands {
                println!(
                    "  {:<9} min {:>8.1}  max {:>8.1}  mean {:>10.3}  std {:>10.3}",
                    role.name(),
                    stats.min,
                    stats.max,
                    stats.mean,
                    stats.std
                );
            }
            Ok(ExitCode::SUCCESS)
        }
        Commands::Inspect { landscape } => {
            inspect(&LandscapeInfo::open(landscape)?);
            Ok(ExitCode::SUCCESS)
        }
        Commands::Input {
            params,
            variant,
            out_dir,
            name,
        } => {
            let mut params = ParameterSet::load(params)?;
            if let Some(variant) = variant {
                params.variant = variant;
            }
            std::fs::create_dir_all(&out_dir)
                .map_err(|e| FireModelError::WriteError {
                    path: out_dir.clone(),
                    source: e,
                })?;
            let path = write_input_file(&params, input_file_path(&out_dir, &name))?;
            println!("Wrote {}", path.display());
            Ok(ExitCode::SUCCESS)
        }
        Commands::Run { definition } => {
            let supervisor = ProcessSupervisor::new(registry(args.config, args.bin_dir)?);
            let outcome = execute_run(RunDefinition::load(definition)?, &supervisor)?;
            println!("Landscape: {}", outcome.landscape.display());
            println!("Inputs:    {}", outcome.input_file.display());
            println!("Command:   {}", outcome.command_file.display());
            Ok(report(&outcome.result))
        }
        Commands::Sample { variant, dir } => {
            let supervisor = ProcessSupervisor::new(registry(args.config, args.bin_dir)?);
            Ok(report(&supervisor.run_sample(variant, dir)?))
        }
    }
}

fn registry(
    config: Option<PathBuf>,
    bin_dir: Option<PathBuf>,
) -> Result<SimulatorRegistry, FireModelError> {
    match (config, bin_dir) {
        (Some(config), _) => SimulatorRegistry::load(config),
        (None, Some(dir)) => Ok(SimulatorRegistry::from_bin_dir(dir)),
        (None, None) => Err(FireModelError::Config(
            "pass --config or --bin-dir to locate the simulators".into(),
        )),
    }
}

fn report(result: &ProcessResult) -> ExitCode {
    print!("{}", result.stdout);
    eprint!("{}", result.stderr);
    match result.exit_code {
        Some(0) => ExitCode::SUCCESS,
        Some(code) => ExitCode::from(u8::try_from(code).unwrap_or(1)),
        None => ExitCode::FAILURE,
    }
}

fn inspect(info: &LandscapeInfo) {
    println!("{}", info.path.display());
    println!(
        "  {}x{} cells, {} bands, tiles {}x{}",
        info.width, info.height, info.band_count, info.tile_width, info.tile_height
    );
    println!(
        "  compression {}, predictor {}, nodata {:?}",
        info.compression, info.predictor, info.nodata
    );
    if let Some(resolution) = info.resolution() {
        println!("  resolution {resolution}");
    }
    for band in &info.bands {
        println!(
            "  {:<9} min {:>8.1}  max {:>8.1}  mean {:>10.3}  std {:>10.3}",
            band.name, band.stats.min, band.stats.max, band.stats.mean, band.stats.std
        );
    }
}
