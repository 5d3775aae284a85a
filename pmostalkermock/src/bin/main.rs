use pmostalkermock::logs::init_logging;
use pmostalkermock::server::PORTAL_PATHS;
use pmostalkermock::{MockServer, ScenarioRegistry};
use tracing::info;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let config = pmoconfig::get_config();
    init_logging(&config);

    let mut server = MockServer::from_config()?;
    let addr = server.start().await?;
    let base = format!("http://localhost:{}", addr.port());

    info!("Portal endpoints:");
    for path in PORTAL_PATHS {
        info!("  {}{}", base, path);
    }
    info!("Proxy: {}/stalker?macAddress=<mac>&action=<action>", base);
    info!(
        "Tokens enforced: {}, page size: {}",
        server.dispatcher().enforces_tokens(),
        server.dispatcher().page_size()
    );

    let registry = ScenarioRegistry::builtin();
    info!("Scenarios by MAC (any other MAC gets a seeded 'auto' scenario):");
    for (mac, scenario) in registry.mac_scenarios() {
        info!("  {}  {:<16} {}", mac, scenario.name, scenario.description);
    }
    info!("Accounts for do_auth:");
    for (account, scenario) in registry.account_scenarios() {
        info!("  {:<20} {}", account, scenario.description);
    }
    info!("Utilities: GET {base}/health, POST {base}/reset");

    server.wait().await;
    Ok(())
}
