use engine::{LoopConfig, Scene};
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

use super::gameplay::CrawlScene;
use super::session::SessionClient;
use super::source::{FixtureSource, GameSource};

const SERVER_ENV_VAR: &str = "CRAWL_SERVER";
const SID_ENV_VAR: &str = "CRAWL_SID";
const FIXTURE_ENV_VAR: &str = "CRAWL_FIXTURE";
const MAX_FPS_ENV_VAR: &str = "CRAWL_MAX_FPS";

const DEFAULT_SERVER_ADDR: &str = "127.0.0.1:5190";

pub(crate) struct AppWiring {
    pub(crate) config: LoopConfig,
    pub(crate) scene: Box<dyn Scene>,
}

pub(crate) fn build_app() -> AppWiring {
    init_tracing();
    info!("=== Tile Crawler Startup ===");

    let source = build_source();
    let config = LoopConfig {
        max_render_fps: parse_max_fps_from_env(),
        ..LoopConfig::default()
    };

    AppWiring {
        config,
        scene: Box::new(CrawlScene::new(source)),
    }
}

fn build_source() -> Box<dyn GameSource> {
    if std::env::var(FIXTURE_ENV_VAR).is_ok() {
        info!("data_source_fixture_forced");
        return Box::new(FixtureSource::new());
    }

    let addr =
        std::env::var(SERVER_ENV_VAR).unwrap_or_else(|_| DEFAULT_SERVER_ADDR.to_string());
    let sid = match std::env::var(SID_ENV_VAR) {
        Ok(sid) if !sid.trim().is_empty() => sid,
        _ => {
            warn!(var = SID_ENV_VAR, "session_id_missing_using_fixture");
            return Box::new(FixtureSource::new());
        }
    };

    let client = SessionClient::connect(&addr, sid);
    if client.is_connected() {
        info!(addr, "data_source_session");
    }
    Box::new(client)
}

fn init_tracing() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_thread_names(true)
        .compact()
        .init();
}

fn parse_max_fps_from_env() -> Option<u32> {
    let raw = std::env::var(MAX_FPS_ENV_VAR).ok()?;
    match raw.trim().parse::<u32>() {
        Ok(fps) if fps > 0 => Some(fps),
        _ => {
            warn!(var = MAX_FPS_ENV_VAR, value = raw, "ignoring_invalid_fps_cap");
            None
        }
    }
}
