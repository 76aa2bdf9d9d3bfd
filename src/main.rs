use std::path::PathBuf;

use anyhow::Context;
use clap::Parser;
use house_price_predictor::models::tree::TreeParams;
use house_price_predictor::{logging, ModelKind, TrainingConfig, TrainingPipeline, ZeroVariance};

// Training entry point
// 1. Load the CSV (downloading it first if a URL is given and the file is absent)
// 2. Split into train and test sets
// 3. Engineer + scale features, fitting the transformer on the training set
// 4. Train the chosen model, evaluate on the test set
// 5. Persist transformer and model to the artifact directory

#[derive(Parser, Debug)]
#[command(name = "house-price-train", about = "Train a housing price model", version)]
struct Args {
    /// Path to the housing CSV
    #[arg(long, env = "HOUSE_DATASET", default_value = "housing.csv")]
    dataset: PathBuf,

    /// Download the dataset from here when the file is missing
    #[arg(long, env = "HOUSE_DATASET_URL")]
    dataset_url: Option<String>,

    /// Directory for the fitted transformer and model
    #[arg(long, env = "HOUSE_ARTIFACTS", default_value = "model")]
    artifacts: PathBuf,

    /// Fraction of rows held out for evaluation
    #[arg(long, env = "HOUSE_TEST_SIZE", default_value_t = 0.2)]
    test_size: f64,

    #[arg(long, env = "HOUSE_SEED", default_value_t = 42)]
    seed: u64,

    /// Model to train and persist
    #[arg(long, env = "HOUSE_MODEL", value_enum, default_value_t = ModelKind::Forest)]
    model: ModelKind,

    /// Additional models to evaluate on the same split (not persisted)
    #[arg(long = "baseline", value_enum)]
    baselines: Vec<ModelKind>,

    /// Handling of constant training columns
    #[arg(long, env = "HOUSE_ZERO_VARIANCE", value_enum, default_value_t = ZeroVariance::Clamp)]
    zero_variance: ZeroVariance,

    /// Forest size
    #[arg(long, default_value_t = 200)]
    trees: usize,

    /// Depth limit for forest trees (unlimited when omitted)
    #[arg(long)]
    max_depth: Option<usize>,

    /// Boosting rounds
    #[arg(long, default_value_t = 300)]
    rounds: usize,

    #[arg(long, default_value_t = 0.05)]
    learning_rate: f64,

    /// Depth of each boosted tree
    #[arg(long, default_value_t = 6)]
    boost_depth: usize,
}

impl Args {
    fn into_config(self) -> TrainingConfig {
        let mut config = TrainingConfig {
            dataset_path: self.dataset,
            dataset_url: self.dataset_url,
            artifact_dir: self.artifacts,
            test_size: self.test_size,
            seed: self.seed,
            model: self.model,
            baselines: self.baselines,
            zero_variance: self.zero_variance,
            ..TrainingConfig::default()
        };

        config.models.forest.n_trees = self.trees;
        config.models.forest.seed = self.seed;
        config.models.forest.tree = TreeParams { max_depth: self.max_depth, ..TreeParams::default() };
        config.models.boosting.n_rounds = self.rounds;
        config.models.boosting.learning_rate = self.learning_rate;
        config.models.boosting.max_depth = self.boost_depth;
        config.models.boosting.seed = self.seed;
        config
    }
}

fn main() -> anyhow::Result<()> {
    logging::init("info");

    let config = Args::parse().into_config();
    let dataset = config.dataset_path.clone();

    let outcome = TrainingPipeline::new(config)
        .run()
        .with_context(|| format!("training on {} failed", dataset.display()))?;

    println!("\n=== {} Evaluation ===", outcome.model_name);
    println!("{}", outcome.report);
    for baseline in &outcome.baselines {
        println!("\n=== {} Evaluation ===", baseline.name);
        println!("{}", baseline.report);
    }

    println!(
        "\nModel and transformer saved to '{}' ({} features, {} train / {} test rows)",
        outcome.artifact_dir.display(),
        outcome.n_features,
        outcome.n_train,
        outcome.n_test
    );

    Ok(())
}
