use std::net::{IpAddr, SocketAddr};
use std::path::PathBuf;
use std::sync::Arc;

use clap::Parser;
use house_price_predictor::http::{routes, ServingState};
use house_price_predictor::{logging, ModelStore, PredictionService, ServeConfig, ServingContext};
use tracing::{error, info, warn};

/// Housing price prediction server
#[derive(Parser, Debug)]
#[command(name = "house-price-serve", about = "Serve housing price predictions over HTTP", version)]
struct Args {
    /// Directory holding transformer.json and model.json
    #[arg(long, env = "HOUSE_ARTIFACTS", default_value = "model")]
    artifacts: PathBuf,

    /// Directory with index.html and the prediction form's scripts
    #[arg(long, env = "HOUSE_ASSETS", default_value = "static")]
    assets: PathBuf,

    #[arg(long, env = "HOUSE_HOST", default_value = "127.0.0.1")]
    host: IpAddr,

    #[arg(short, long, env = "HOUSE_PORT", default_value_t = 5000)]
    port: u16,
}

#[tokio::main]
async fn main() {
    logging::init("info");

    let args = Args::parse();
    let config = ServeConfig {
        artifact_dir: args.artifacts,
        asset_dir: args.assets,
        addr: SocketAddr::new(args.host, args.port),
    };

    let store = ModelStore::new(&config.artifact_dir);
    let state = match ServingContext::load(&store) {
        Ok(context) => ServingState::Ready(PredictionService::new(Arc::new(context))),
        Err(e) => {
            error!(error = %e, dir = %config.artifact_dir.display(), "artifacts unavailable, serving 503");
            ServingState::Unavailable(e.to_string())
        }
    };

    if !config.asset_dir.join("index.html").is_file() {
        warn!(dir = %config.asset_dir.display(), "no index.html, the prediction form will 404");
    }

    info!(addr = %config.addr, "prediction server listening");
    warp::serve(routes(Arc::new(state), &config.asset_dir)).run(config.addr).await;
}
