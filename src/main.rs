//! Command line interface for the polycube rule search

use anyhow::{Context, Result};
use clap::{ArgAction, Parser, Subcommand, ValueEnum};
use env_logger::Builder;
use log::LevelFilter;
use polycube_rule_search::{
    config::{CliOverrides, OutputFormat, Settings},
    polycube::io::create_example_problems,
    polycube::{Rule, Vec3},
    search::{Budget, SearchProblem},
    utils::{ColorOutput, SolutionFormatter},
};
use std::path::{Path, PathBuf};
use std::time::Instant;

#[derive(Parser)]
#[command(name = "polycube_rule_search")]
#[command(about = "Minimal polycube assembly rule search")]
#[command(version = "0.1.0")]
struct Cli {
    /// More log output (-v info, -vv debug, -vvv trace)
    #[arg(short, long, action = ArgAction::Count, global = true)]
    verbose: u8,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Clone, Copy, ValueEnum)]
enum FormatArg {
    Text,
    Json,
    Hex,
}

impl From<FormatArg> for OutputFormat {
    fn from(format: FormatArg) -> Self {
        match format {
            FormatArg::Text => OutputFormat::Text,
            FormatArg::Json => OutputFormat::Json,
            FormatArg::Hex => OutputFormat::Hex,
        }
    }
}

#[derive(Subcommand)]
enum Commands {
    /// Search for the cheapest rule that assembles a topology
    Solve {
        /// Configuration file path
        #[arg(short, long, default_value = "config/default.yaml")]
        config: PathBuf,

        /// Topology file (overrides config)
        #[arg(short, long)]
        topology: Option<PathBuf>,

        /// Largest number of cube types to try (overrides config)
        #[arg(long)]
        max_cube_types: Option<usize>,

        /// Largest number of colors to try (overrides config)
        #[arg(long)]
        max_colors: Option<usize>,

        /// Worker threads, 0 for one per core (overrides config)
        #[arg(short = 'j', long)]
        threads: Option<usize>,

        /// Solver time limit per budget in seconds (overrides config)
        #[arg(long)]
        timeout: Option<u64>,

        /// Run every budget instead of stopping at the first minimal rule
        #[arg(long)]
        exhaustive: bool,

        /// Output directory (overrides config)
        #[arg(short, long)]
        output: Option<PathBuf>,

        /// Report format (overrides config)
        #[arg(short, long, value_enum)]
        format: Option<FormatArg>,
    },

    /// Write the CNF of one budget in DIMACS format
    Encode {
        #[arg(short, long, default_value = "config/default.yaml")]
        config: PathBuf,

        #[arg(short, long)]
        topology: Option<PathBuf>,

        /// Number of cube types
        #[arg(long)]
        cube_types: usize,

        /// Number of colors
        #[arg(long)]
        colors: usize,

        /// Output file; stdout if omitted
        #[arg(short, long)]
        output: Option<PathBuf>,
    },

    /// Convert a rule between the decimal and hex formats
    Decode {
        /// Rule in decimal (`1:0|-1:0|...`) or hex form
        rule: String,

        /// Simplify the rule before printing
        #[arg(long)]
        simplify: bool,
    },

    /// Print the fully addressable rule of a topology
    Baseline {
        #[arg(short, long, default_value = "config/default.yaml")]
        config: PathBuf,

        #[arg(short, long)]
        topology: Option<PathBuf>,
    },

    /// Create example configuration and topology files
    Setup {
        /// Directory to create files in
        #[arg(short, long, default_value = ".")]
        directory: PathBuf,

        /// Force overwrite existing files
        #[arg(short, long)]
        force: bool,
    },

    /// Show topology statistics and encoding size estimates
    Analyze {
        #[arg(short, long, default_value = "config/default.yaml")]
        config: PathBuf,

        #[arg(short, long)]
        topology: Option<PathBuf>,
    },
}

fn init_logging(verbosity: u8) {
    let level = match verbosity {
        0 => LevelFilter::Warn,
        1 => LevelFilter::Info,
        2 => LevelFilter::Debug,
        _ => LevelFilter::Trace,
    };

    let mut builder = Builder::new();
    builder.filter(None, level).format_timestamp(None);

    if let Ok(ref env_var) = std::env::var("POLYCUBE_LOG") {
        builder.parse_filters(env_var);
    }

    // Already initialised when commands run in-process more than once
    let _ = builder.try_init();
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    init_logging(cli.verbose);

    match cli.command {
        Commands::Solve {
            config,
            topology,
            max_cube_types,
            max_colors,
            threads,
            timeout,
            exhaustive,
            output,
            format,
        } => {
            let overrides = CliOverrides {
                topology_file: topology,
                max_cube_types,
                max_colors,
                threads,
                timeout_seconds: timeout,
                exhaustive,
                output_dir: output,
                format: format.map(OutputFormat::from),
            };
            solve_command(&config, &overrides)
        }
        Commands::Encode {
            config,
            topology,
            cube_types,
            colors,
            output,
        } => encode_command(&config, topology, Budget::new(cube_types, colors), output),
        Commands::Decode { rule, simplify } => decode_command(&rule, simplify),
        Commands::Baseline { config, topology } => baseline_command(&config, topology),
        Commands::Setup { directory, force } => setup_command(directory, force),
        Commands::Analyze { config, topology } => analyze_command(&config, topology),
    }
}

/// Settings from `config_path`, or the defaults when it does not exist
fn load_settings(config_path: &Path, overrides: &CliOverrides) -> Result<Settings> {
    let mut settings = if config_path.exists() {
        Settings::from_file(&config_path.to_path_buf())
            .with_context(|| format!("Failed to load config from {}", config_path.display()))?
    } else {
        // stdout may carry DIMACS
        eprintln!(
            "{}",
            ColorOutput::warning(&format!(
                "Config file {} not found, using defaults",
                config_path.display()
            ))
        );
        Settings::default()
    };

    settings.merge_with_cli(overrides);
    settings
        .validate()
        .context("Configuration validation failed")?;
    Ok(settings)
}

fn topology_override(topology: Option<PathBuf>) -> CliOverrides {
    CliOverrides {
        topology_file: topology,
        ..CliOverrides::default()
    }
}

fn solve_command(config_path: &Path, overrides: &CliOverrides) -> Result<()> {
    println!("{}", ColorOutput::info("Starting polycube rule search"));

    let settings = load_settings(config_path, overrides)?;
    let start_time = Instant::now();
    let problem = SearchProblem::new(settings.clone()).context("Failed to create search problem")?;

    println!(
        "Topology {}: {} positions, {} bindings; {} budgets to search",
        settings.problem.topology_file.display(),
        problem.topology().position_count(),
        problem.topology().binding_count(),
        problem.budgets().len()
    );

    let report = problem.solve().context("Search failed")?;
    let total_time = start_time.elapsed();

    println!();
    println!("{}", SolutionFormatter::format_report(&report));

    match report.best {
        Some(ref found) if found.proven_minimal => println!(
            "{}",
            ColorOutput::success(&format!(
                "Found a minimal rule in {:.3}s",
                total_time.as_secs_f64()
            ))
        ),
        Some(_) => println!(
            "{}",
            ColorOutput::warning("Found a rule, but a cheaper budget is unresolved")
        ),
        None => println!("{}", ColorOutput::error("No rule found")),
    }

    let path = SolutionFormatter::save_report(
        &report,
        &settings.output.output_directory,
        settings.output.format,
    )
    .context("Failed to save report")?;
    println!("Report saved to {}", path.display());

    Ok(())
}

fn encode_command(
    config_path: &Path,
    topology: Option<PathBuf>,
    budget: Budget,
    output: Option<PathBuf>,
) -> Result<()> {
    let settings = load_settings(config_path, &topology_override(topology))?;
    let problem = SearchProblem::new(settings)?;
    let cnf = problem
        .encode_budget(budget)
        .with_context(|| format!("Failed to encode budget {}", budget))?;

    match output {
        Some(path) => {
            cnf.write_dimacs(&path)?;
            println!(
                "Wrote {} variables, {} clauses to {}",
                cnf.variable_count,
                cnf.clauses.len(),
                path.display()
            );
        }
        None => print!("{}", cnf.to_dimacs()),
    }
    Ok(())
}

fn print_rule(rule: &Rule) -> Result<()> {
    println!("dec: {}", rule.to_dec());
    println!("hex: {}", rule.to_hex()?);
    println!();
    print!("{}", SolutionFormatter::format_rule(rule));
    Ok(())
}

fn decode_command(text: &str, simplify: bool) -> Result<()> {
    let mut rule: Rule = text
        .trim()
        .parse()
        .with_context(|| format!("Failed to parse rule '{}'", text))?;
    if simplify {
        rule = rule.simplify();
    }

    println!(
        "{} cube type(s), {} color(s)",
        rule.len(),
        rule.color_count()
    );
    print_rule(&rule)
}

fn baseline_command(config_path: &Path, topology: Option<PathBuf>) -> Result<()> {
    let settings = load_settings(config_path, &topology_override(topology))?;
    let problem = SearchProblem::new(settings)?;
    let rule = problem.baseline()?;

    println!(
        "{}",
        ColorOutput::info(&format!(
            "Fully addressable rule: {} cube types, {} colors",
            rule.len(),
            rule.color_count()
        ))
    );
    print_rule(&rule)?;

    let simplified = rule.simplify();
    if simplified != rule {
        println!();
        println!(
            "{}",
            ColorOutput::info(&format!(
                "Simplified: {} cube types, {} colors",
                simplified.len(),
                simplified.color_count()
            ))
        );
        print_rule(&simplified)?;
    }
    Ok(())
}

fn setup_command(directory: PathBuf, force: bool) -> Result<()> {
    println!("{}", ColorOutput::info("Setting up project structure..."));

    let config_dir = directory.join("config");
    let input_dir = directory.join("input/problems");
    let output_dir = directory.join("output/rules");

    for dir in [&config_dir, &input_dir, &output_dir] {
        std::fs::create_dir_all(dir)
            .with_context(|| format!("Failed to create directory {}", dir.display()))?;
    }

    let config_path = config_dir.join("default.yaml");
    if !config_path.exists() || force {
        Settings::default()
            .to_file(&config_path)
            .context("Failed to create default configuration")?;
        println!("Created: {}", config_path.display());
    } else {
        println!("Skipped: {} (already exists)", config_path.display());
    }

    create_example_problems(&input_dir).context("Failed to create example problems")?;
    println!("Created example topologies in: {}", input_dir.display());

    let examples_dir = config_dir.join("examples");
    std::fs::create_dir_all(&examples_dir)?;

    // A planar problem
    let mut square = Settings::default();
    square.problem.topology_file = PathBuf::from("input/problems/square.txt");
    square.to_file(&examples_dir.join("square.yaml"))?;

    // Every budget of a larger shape, with found rules simplified
    let mut cube = Settings::default();
    cube.problem.topology_file = PathBuf::from("input/problems/cube.txt");
    cube.search.stop_at_first = false;
    cube.search.max_cube_types = Some(3);
    cube.search.max_colors = Some(4);
    cube.encoding.simplify = true;
    cube.output.format = OutputFormat::Json;
    cube.to_file(&examples_dir.join("cube_exhaustive.yaml"))?;

    println!("Created example configurations in: {}", examples_dir.display());

    println!("\n{}", ColorOutput::success("Setup complete!"));
    println!("\nNext steps:");
    println!("1. Edit configuration files in {}", config_dir.display());
    println!("2. Add your topologies to {}", input_dir.display());
    println!("3. Run: cargo run -- solve --config config/default.yaml");

    Ok(())
}

fn analyze_command(config_path: &Path, topology: Option<PathBuf>) -> Result<()> {
    println!("{}", ColorOutput::info("Analyzing topology..."));

    let settings = load_settings(config_path, &topology_override(topology))?;
    let problem = SearchProblem::new(settings)?;
    let topology = problem.topology();

    println!("Topology Statistics:");
    println!("  Positions: {}", topology.position_count());
    println!("  Bindings: {}", topology.binding_count());
    println!("  Empty patches: {}", topology.empty_patches().len());
    println!(
        "  Lattice: {}D, torsion {}, {}",
        problem.dimensions(),
        if problem.torsion() { "on" } else { "off" },
        if topology.is_planar() { "planar" } else { "non-planar" }
    );
    match topology.coordinates() {
        Ok(coordinates) => {
            let extent = |axis: fn(&Vec3) -> i32| {
                let values = coordinates.iter().map(axis);
                values.clone().max().unwrap_or(0) - values.min().unwrap_or(0) + 1
            };
            println!(
                "  Extent: {} x {} x {}",
                extent(|v| v.x),
                extent(|v| v.y),
                extent(|v| v.z)
            );
        }
        Err(e) => println!("{}", ColorOutput::warning(&format!("  No lattice embedding: {}", e))),
    }

    let range = problem.budget_range();
    println!(
        "\nBudgets: cube types {}..={}, colors {}..={} ({} total)",
        range.min_cube_types,
        range.max_cube_types,
        range.min_colors,
        range.max_colors,
        problem.budgets().len()
    );
    for estimate in problem.estimate_complexity() {
        print!("{}", estimate);
    }

    Ok(())
}
