mod bootstrap;
mod gameplay;
mod session;
mod source;

use tracing::error;

pub(crate) fn run() {
    let wiring = bootstrap::build_app();
    if let Err(err) = engine::run_app(wiring.config, wiring.scene) {
        error!(error = %err, "startup_failed");
        std::process::exit(1);
    }
}
