//! QEMU emulator setup for cross-architecture builds

use crate::process::{CommandRunner, CommandSpec};
use crate::ui::{self, UiContext};
use tracing::{info, warn};

const BINFMT_IMAGE: &str = "tonistiigi/binfmt:qemu-v6.2.0";

/// Whether the job runs on a self-hosted runner (`RUNNER_OS=self-hosted`)
pub fn is_self_hosted_runner() -> bool {
    std::env::var("RUNNER_OS").is_ok_and(|os| os.eq_ignore_ascii_case("self-hosted"))
}

/// binfmt installer image; self-hosted runners pull through `registry`
pub fn binfmt_image(self_hosted: bool, registry: &str) -> String {
    if self_hosted {
        format!("{}/tradeshift-base/{}", registry, BINFMT_IMAGE)
    } else {
        format!("public.ecr.aws/tradeshift/{}", BINFMT_IMAGE)
    }
}

/// Register QEMU emulators for all architectures. Failure is a warning.
pub async fn setup(runner: &dyn CommandRunner, ui_ctx: &UiContext, registry: &str) {
    let _group = ui::group(ui_ctx, "Setup qemu");
    install(runner, &binfmt_image(is_self_hosted_runner(), registry)).await;
}

async fn install(runner: &dyn CommandRunner, image: &str) {
    let spec = CommandSpec::new(
        "docker",
        ["run", "--privileged", "--rm", image, "--install", "all"],
    )
    .streaming();

    match runner.run(&spec).await {
        Ok(output) if output.success() => info!("QEMU emulators installed from {}", image),
        Ok(output) => warn!("qemu setup failed: {}", output.failure_detail()),
        Err(e) => warn!("qemu setup failed: {}", e),
    }
}
