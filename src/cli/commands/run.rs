//! Run command - execute the due phase of the pipeline

use crate::cache::LocalCacheStore;
use crate::cli::args::RunArgs;
use crate::config::Config;
use crate::controller::{Controller, Services};
use crate::error::DockhandResult;
use crate::inputs::Inputs;
use crate::outputs::StepOutputs;
use crate::process::NativeRunner;
use crate::state;
use crate::ui::UiContext;
use tracing::{debug, info};

/// Execute the run command
pub async fn execute(args: RunArgs, config: &Config) -> DockhandResult<()> {
    let inputs = Inputs::from_args(&args);
    let store = state::open_store(&config.state, args.state_file)?;
    debug!("Job state backend: {}", store.backend_name());

    let runner = NativeRunner::new();
    let cache = LocalCacheStore::new(&config.cache.store_dir).with_keep(config.cache.keep);
    debug!("Cache store: {}", cache.dir().display());
    let outputs = StepOutputs::from_env();

    let services = Services {
        runner: &runner,
        state: store.as_ref(),
        cache: &cache,
        outputs: &outputs,
    };

    let phase = Controller::new(inputs, config, services, UiContext::detect())
        .run()
        .await?;
    info!("Finished {} phase", phase);
    Ok(())
}
