use std::fs::File;
use std::path::PathBuf;
use std::time::Duration;

use clap::{Parser, Subcommand};
use color_eyre::eyre::eyre;
use color_eyre::Result;
use fm_logic::analysis::FeatureAnalyzer;
use fm_logic::config::{Config, CrossTreePolicy, SelectionMode};
use fm_logic::document::parse_outline;
use fm_logic::model::FeatureModel;
use fm_logic::mwp::MwpEnumerator;
use fm_logic::oracle::Varisat;
use fm_logic::types::FeatureId;
use fm_logic::validate::{ConfigurationValidator, Validation};

#[derive(Parser)]
#[command(author, version, about = "Feature model logic: CNF encoding, validation, minimum products")]
struct Cli {
    /// Input file in the outline format
    #[arg(short, long, value_name = "FILE")]
    input: PathBuf,

    /// Wall-clock budget per solve, in milliseconds (0 disables the budget)
    #[arg(long, value_name = "MS", default_value_t = 10_000)]
    timeout: u64,

    /// Maximum number of minimum working products to enumerate
    #[arg(long, value_name = "INT", default_value_t = 10_000)]
    max: usize,

    /// Treat unselected features as unconstrained instead of deselected
    #[arg(long)]
    partial: bool,

    /// Drop minimum products that violate cross-tree constraints
    #[arg(long)]
    filter: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Print the encoding as readable formulas
    Logic,

    /// Print the encoding in DIMACS CNF
    Dimacs,

    /// Check whether a selection of features is a valid configuration
    Validate {
        /// Selected feature names
        #[arg(required = true)]
        features: Vec<String>,
    },

    /// List minimum working products
    Mwp {
        /// Only print how many there are
        #[arg(long)]
        count: bool,
    },

    /// Show statistics, core and dead features
    Analyze,
}

fn main() -> Result<()> {
    color_eyre::install()?;

    simplelog::TermLogger::init(
        simplelog::LevelFilter::Info,
        simplelog::Config::default(),
        simplelog::TerminalMode::Mixed,
        simplelog::ColorChoice::Auto,
    )?;

    let cli = Cli::parse();

    log::info!("Loading feature model from {:?}", cli.input);
    let file = File::open(&cli.input)?;
    let doc = parse_outline(file).map_err(|e| eyre!(e))?;
    let model = FeatureModel::from_document(&doc)?;

    log::info!(
        "Loaded model with {} features and {} constraints",
        model.num_features(),
        model.constraints().len()
    );

    let config = Config::default()
        .with_solve_timeout((cli.timeout > 0).then(|| Duration::from_millis(cli.timeout)))
        .with_max_configurations(cli.max)
        .with_selection_mode(if cli.partial {
            SelectionMode::Partial
        } else {
            SelectionMode::Complete
        })
        .with_cross_tree(if cli.filter {
            CrossTreePolicy::Filter
        } else {
            CrossTreePolicy::Ignore
        });

    match cli.command {
        Commands::Logic => {
            for entry in model.cnf().listing(&model) {
                println!("{}", entry);
            }
        }

        Commands::Dimacs => {
            print!("{}", model.cnf().to_dimacs(&model)?);
        }

        Commands::Validate { features } => {
            let validator = ConfigurationValidator::new(&model).with_config(config);
            match validator.validate(&features)? {
                Validation::Valid { selected, deselected } => {
                    println!("✓ Valid configuration");
                    println!("  Selected:   {}", selected.join(", "));
                    println!("  Deselected: {}", deselected.join(", "));
                }
                Validation::Invalid { reason, violations } => {
                    println!("✗ Invalid configuration ({})", reason);
                    for violation in violations {
                        println!("  - {}", violation);
                    }
                }
            }
        }

        Commands::Mwp { count } => {
            let enumerator = MwpEnumerator::with_config(&model, &config);
            if count {
                println!("Minimum working products: {}", enumerator.count());
            } else {
                let products = enumerator.enumerate()?;
                println!("Found {} minimum working products:", products.len());
                for (i, product) in products.iter().enumerate() {
                    println!("  {:>4}: {{{}}}", i + 1, product.join(", "));
                }
            }
        }

        Commands::Analyze => {
            let analyzer = FeatureAnalyzer::with_backend(&model, Varisat::default(), config);
            let stats = analyzer.statistics()?;
            println!("{}", stats);

            if stats.is_void {
                return Err(eyre!("Feature model has no valid configuration"));
            }
            println!("Core features:");
            print_features(&model, &analyzer.core_features()?);
            println!("Dead features:");
            print_features(&model, &analyzer.dead_features()?);
        }
    }

    Ok(())
}

fn print_features(model: &FeatureModel, ids: &[FeatureId]) {
    if ids.is_empty() {
        println!("  (none)");
    }
    for &id in ids {
        println!("  {}: {}", id, model.name(id));
    }
}
