use anyhow::Result;
use ex_gpt_gateway::client::{BackendSelector, HealthProbe};
use ex_gpt_gateway::config::Config;
use ex_gpt_gateway::models::{HealthState, HealthStatus};

fn icon(state: HealthState) -> &'static str {
    match state {
        HealthState::Healthy => "✅",
        HealthState::Offline => "🔌",
        HealthState::Timeout => "⏱️",
        HealthState::Error => "❌",
    }
}

fn print_status(status: &HealthStatus) {
    println!(
        "{} {:<5} {:<45} {:>8} {:>6} ms  {}",
        icon(status.status),
        status.backend_name,
        status.url,
        format!("{:?}", status.status),
        status.latency_ms,
        status.detail.as_deref().unwrap_or("")
    );
}

#[tokio::main]
async fn main() -> Result<()> {
    println!("🚀 ex-GPT Backend Health Probe");
    println!("{}", "=".repeat(50));

    let config = Config::from_env()?;
    let probe = HealthProbe::new(config.health_timeout)?;

    let selector = BackendSelector::new(config.main_backend.clone(), config.test_backend.clone());
    println!("Timeout per probe: {:?}", probe.timeout());
    for backend in [selector.main(), selector.test()] {
        println!("  {} -> {}", backend.name, backend.base_url);
    }
    println!();

    let statuses = futures::future::join_all(
        selector
            .health_targets()
            .into_iter()
            .map(|(backend, endpoint)| probe.probe_backend(backend, endpoint)),
    )
    .await;

    println!("{}", "─".repeat(60));
    for status in &statuses {
        print_status(status);
    }
    println!("{}", "─".repeat(60));

    let healthy = statuses.iter().filter(|s| s.status.is_healthy()).count();
    println!("\n{}/{} endpoints healthy", healthy, statuses.len());

    if healthy == 0 {
        anyhow::bail!("no backend endpoint is healthy");
    }
    Ok(())
}
