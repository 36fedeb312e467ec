//! Architecture evolution CLI - Run a search from JSON configuration.

#[cfg(feature = "dhat-heap")]
#[global_allocator]
static ALLOC: dhat::Alloc = dhat::Alloc;

use std::fs;
use std::path::PathBuf;

use arch_evo::{
    EvolutionConfig, EvolutionEngine,
    evolution::{StopReason, build_evaluator},
};

fn main() {
    #[cfg(feature = "dhat-heap")]
    let _profiler = dhat::Profiler::new_heap();

    env_logger::init();

    let args: Vec<String> = std::env::args().collect();

    if args.len() < 2 {
        eprintln!("Usage: {} <config.json> [result.json]", args[0]);
        eprintln!();
        eprintln!("Evolve generator architectures from a JSON configuration.");
        eprintln!();
        eprintln!("Arguments:");
        eprintln!("  config.json  Path to evolution configuration file");
        eprintln!("  result.json  Where to write the run result (optional)");
        eprintln!();
        eprintln!("Example configuration is generated with --example flag.");
        std::process::exit(1);
    }

    if args[1] == "--example" {
        print_example_config();
        return;
    }

    let config_path = PathBuf::from(&args[1]);
    let output_path = args.get(2).map(PathBuf::from);

    // Load configuration
    let config_str = fs::read_to_string(&config_path).unwrap_or_else(|e| {
        eprintln!("Error reading config file: {}", e);
        std::process::exit(1);
    });

    let config: EvolutionConfig = serde_json::from_str(&config_str).unwrap_or_else(|e| {
        eprintln!("Error parsing config: {}", e);
        std::process::exit(1);
    });

    if let Err(e) = config.validate() {
        eprintln!("Invalid config: {}", e);
        std::process::exit(1);
    }

    println!("Architecture Evolution");
    println!("======================");
    println!(
        "Layout: {}",
        config
            .layout
            .iter()
            .map(|s| format!("{}({:?})", s.kind().name(), s.encoding()))
            .collect::<Vec<_>>()
            .join(", ")
    );
    println!("Population: {}", config.population.size);
    println!("Epochs: {}", config.population.epochs);
    println!("Initial mutation probability: {}", config.mutation.initial);
    println!();

    let evaluator = build_evaluator(&config.evaluation.evaluator);
    let mut engine = EvolutionEngine::new(config, evaluator);

    let result = engine
        .run_with_callback(|snapshot| {
            println!(
                "EPOCH {} (mutation p={:.4})",
                snapshot.epoch, snapshot.mutation_probability
            );
            print!("{}", snapshot);
            println!();
        })
        .unwrap_or_else(|e| {
            eprintln!("Evolution aborted: {}", e);
            std::process::exit(1);
        });

    if result.stats.stop_reason == StopReason::Cancelled {
        println!("Cancelled after {} epochs", result.stats.epochs);
    }
    println!("FINAL:");
    print!("{}", result.final_population);
    if let Some(best) = &result.best {
        println!();
        println!("Best: {}", best);
    }
    println!(
        "Time: {:.2}s ({} evaluations)",
        result.stats.elapsed_seconds, result.stats.total_evaluations
    );

    if let Some(path) = output_path {
        if let Err(e) = result.save_json(&path) {
            eprintln!("Error writing result: {}", e);
            std::process::exit(1);
        }
        println!("Result written to {}", path.display());
    }
}

fn print_example_config() {
    let config = EvolutionConfig::default();

    println!("Example configuration (config.json):");
    match serde_json::to_string_pretty(&config) {
        Ok(json) => println!("{}", json),
        Err(e) => eprintln!("Error serializing config: {}", e),
    }
}
