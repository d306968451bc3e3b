use anyhow::{Context, Result, bail};
use metricgate_config::Config;
use metricgate_statsd::MetricsClientConfig;

/// Refuses configurations under which the gateway would reject every request.
pub fn check_config(config: &Config) -> Result<()> {
    if config.admin_key().is_none() && config.tenant_keys().is_empty() {
        bail!(
            "no credentials are configured, so every request would be rejected. \
             Set `auth.admin_key` or add tenant keys to `auth.keys` first.",
        );
    }

    Ok(())
}

/// Print spawn infos to the log.
pub fn dump_spawn_infos(config: &Config) {
    if config.path().as_os_str().is_empty() {
        metricgate_log::info!("launching gateway without config folder");
    } else {
        metricgate_log::info!(
            "launching gateway from config folder {}",
            config.path().display()
        );
    }

    match config.publish_url() {
        Some(url) => metricgate_log::info!("  publish url: {url}"),
        None => metricgate_log::info!("  publish url: - (batches are dropped)"),
    };
    match config.persist_url() {
        Some(url) => metricgate_log::info!("  persist url: {url}"),
        None => metricgate_log::info!("  persist url: -"),
    };
    metricgate_log::info!("  tenants: {}", config.tenant_keys().len());
    metricgate_log::info!("  log level: {}", config.logging().level);
}

/// Initialize the metric system.
pub fn init_metrics(config: &Config) -> Result<()> {
    let Some(host) = config.statsd_addr() else {
        return Ok(());
    };

    let mut default_tags = config.metrics_default_tags().clone();
    if let Some(hostname_tag) = config.metrics_hostname_tag()
        && let Some(hostname) = hostname::get().ok().and_then(|s| s.into_string().ok())
    {
        default_tags.insert(hostname_tag.to_owned(), hostname);
    }

    metricgate_statsd::init(MetricsClientConfig {
        prefix: config.metrics_prefix(),
        host,
        default_tags,
        sample_rate: config.metrics_sample_rate(),
    })
    .context("failed to initialize statsd client")?;

    Ok(())
}
