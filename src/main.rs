mod app;
mod input;
mod renderer;
mod upload;

use anyhow::{Context, Result};
use app::{App, Exit, TerminalNavigator};
use clap::{Parser, ValueEnum};
use input::StdinSource;
use percept_core::{ConditionId, DeviceClass};
use percept_experiment::{
    ExperimentConfig, Finalizer, ProfileHints, RecordStore, TrialStateMachine, assign_condition,
    attention_pool, build_sequence, insert_checks,
};
use percept_store::FileStore;
use percept_timing::HighPrecisionTimer;
use rand::SeedableRng;
use rand::rngs::StdRng;
use std::path::PathBuf;
use std::time::Duration;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;
use upload::{HttpUploader, LocalOnly};

const UPLOAD_TIMEOUT: Duration = Duration::from_secs(10);

/// rate images for moral and aesthetic qualities, with attention checks
#[derive(Parser, Debug, Clone)]
#[clap(version, about)]
struct Cli {
    /// JSON experiment settings; anything left out keeps its default
    #[clap(short = 'c', long)]
    config: Option<PathBuf>,

    /// where participant records are kept (defaults to the user data dir)
    #[clap(long)]
    data_dir: Option<PathBuf>,

    /// reuse or set the participant id instead of the remembered one
    #[clap(long)]
    participant_id: Option<String>,

    #[clap(long)]
    occupation: Option<String>,

    #[clap(long)]
    art_education: Option<String>,

    #[clap(long)]
    art_experience: Option<String>,

    /// assign this condition instead of drawing one (first run only)
    #[clap(long, value_enum)]
    condition: Option<ConditionArg>,

    /// result endpoint, overrides the config file
    #[clap(long)]
    endpoint: Option<String>,

    /// keep results on this machine only
    #[clap(long)]
    no_upload: bool,

    /// seed for reproducible sequences
    #[clap(long)]
    seed: Option<u64>,

    #[clap(long, value_enum)]
    device: Option<DeviceArg>,
}

#[derive(Debug, Copy, Clone, PartialEq, Eq, ValueEnum)]
enum ConditionArg {
    Ai,
    Human,
    Mixed,
}

impl From<ConditionArg> for ConditionId {
    fn from(arg: ConditionArg) -> Self {
        match arg {
            ConditionArg::Ai => ConditionId::Ai,
            ConditionArg::Human => ConditionId::Human,
            ConditionArg::Mixed => ConditionId::Mixed,
        }
    }
}

#[derive(Debug, Copy, Clone, ValueEnum)]
enum DeviceArg {
    Desktop,
    Tablet,
    Mobile,
}

impl From<DeviceArg> for DeviceClass {
    fn from(arg: DeviceArg) -> Self {
        match arg {
            DeviceArg::Desktop => DeviceClass::Desktop,
            DeviceArg::Tablet => DeviceClass::Tablet,
            DeviceArg::Mobile => DeviceClass::Mobile,
        }
    }
}

impl Cli {
    fn load_config(&self) -> Result<ExperimentConfig> {
        let mut config = match &self.config {
            Some(path) => {
                let raw = std::fs::read_to_string(path)
                    .with_context(|| format!("reading config {}", path.display()))?;
                serde_json::from_str::<ExperimentConfig>(&raw)
                    .with_context(|| format!("parsing config {}", path.display()))?
            }
            None => ExperimentConfig::default(),
        };
        if let Some(endpoint) = &self.endpoint {
            config.upload_endpoint = endpoint.clone();
        }
        if let Some(device) = self.device {
            config.device_class = device.into();
        }
        config.validate().context("invalid experiment config")?;
        Ok(config)
    }

    fn hints(&self) -> ProfileHints {
        ProfileHints {
            participant_id: self.participant_id.clone(),
            occupation: self.occupation.clone(),
            art_education: self.art_education.clone(),
            art_experience: self.art_experience.clone(),
            forced_condition: self.condition.map(|arg| ConditionId::from(arg).code()),
        }
    }
}

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    let config = cli.load_config()?;

    let mut store = match &cli.data_dir {
        Some(dir) => FileStore::with_dir(dir),
        None => FileStore::new(),
    };
    info!(dir = %store.dir().display(), "participant records");

    let mut rng = match cli.seed {
        Some(seed) => StdRng::seed_from_u64(seed),
        None => StdRng::from_os_rng(),
    };

    let profile = assign_condition(&cli.hints(), &mut store, &mut rng)?;
    let condition = profile.condition_id;
    let records = RecordStore::open(store, profile, || {
        let base = build_sequence(condition, &config, &mut rng);
        let pool = attention_pool(
            &config.image_base_path,
            &config.categories,
            config.attention_images_per_category,
        );
        insert_checks(base, config.attention_cadence, pool, config.placement, &mut rng)
    })?;

    let uploader: Box<dyn percept_experiment::Uploader> = if cli.no_upload {
        Box::new(LocalOnly)
    } else {
        Box::new(HttpUploader::new(config.upload_endpoint.clone(), UPLOAD_TIMEOUT)?)
    };
    let finalizer = Finalizer::new(uploader, Box::new(TerminalNavigator), config.completion_route.clone());

    let timer = HighPrecisionTimer::new();
    let machine = TrialStateMachine::new(config, timer.clone(), records, finalizer);

    match App::new(machine, timer, StdinSource::new(), std::io::stdout()).run()? {
        Exit::Finished => info!("experiment complete"),
        Exit::Interrupted => warn!("experiment interrupted; run again to resume"),
    }
    Ok(())
}
