use std::path::{Path, PathBuf};

use anyhow::{Result, bail};
use clap::ArgMatches;
use metricgate_config::{Config, OverridableConfig};

use crate::cliapp::make_app;
use crate::setup;

/// Config folder used when no `--config` is passed.
const DEFAULT_CONFIG_PATH: &str = ".metricgate";

/// Runs the command line application.
pub fn execute() -> Result<()> {
    let app = make_app();
    let matches = app.get_matches();
    let config_path = matches
        .get_one::<PathBuf>("config")
        .map_or(Path::new(DEFAULT_CONFIG_PATH), PathBuf::as_path);

    // Commands that do not need to load the config:
    if let Some(config_matches) = matches.subcommand_matches("config")
        && config_matches.subcommand_matches("init").is_some()
    {
        return init_config(config_path);
    }

    let mut config = Config::from_path(config_path)?;
    if let Some(run_matches) = matches.subcommand_matches("run") {
        config.apply_override(extract_config_args(run_matches))?;
    }

    metricgate_log::init(config.logging());

    if let Some(matches) = matches.subcommand_matches("config") {
        manage_config(&config, matches)
    } else if matches.subcommand_matches("run").is_some() {
        run(config)
    } else {
        unreachable!();
    }
}

/// Extracts the config overrides of the `run` command.
pub fn extract_config_args(matches: &ArgMatches) -> OverridableConfig {
    OverridableConfig {
        host: matches.get_one("host").cloned(),
        port: matches.get_one("port").cloned(),
        publish_url: matches.get_one("publish_url").cloned(),
        admin_key: matches.get_one("admin_key").cloned(),
        shutdown_timeout: matches.get_one("shutdown_timeout").cloned(),
    }
}

#[allow(clippy::print_stdout)]
pub fn init_config(config_path: &Path) -> Result<()> {
    if Config::config_exists(config_path) {
        bail!(
            "a config already exists in {}, remove it first",
            config_path.display()
        );
    }

    Config::init_path(config_path)?;
    println!("Initialized config in {}", config_path.display());
    Ok(())
}

#[allow(clippy::print_stdout)]
pub fn manage_config(config: &Config, matches: &ArgMatches) -> Result<()> {
    if let Some(matches) = matches.subcommand_matches("show") {
        match matches.get_one::<String>("format").map(String::as_str) {
            Some("debug") => println!("{config:#?}"),
            _ => print!("{}", config.to_yaml_string()?),
        }
        Ok(())
    } else {
        unreachable!();
    }
}

pub fn run(config: Config) -> Result<()> {
    setup::check_config(&config)?;
    setup::dump_spawn_infos(&config);
    setup::init_metrics(&config)?;
    metricgate_server::run(config)?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn run_matches(args: &[&str]) -> ArgMatches {
        let matches = make_app()
            .try_get_matches_from(args.iter().copied())
            .unwrap();
        matches.subcommand_matches("run").unwrap().clone()
    }

    #[test]
    fn test_extract_config_args() {
        let matches = run_matches(&[
            "metricgate",
            "run",
            "--host",
            "0.0.0.0",
            "--port",
            "8080",
            "--admin-key",
            "secret",
        ]);

        let overrides = extract_config_args(&matches);
        assert_eq!(overrides.host.as_deref(), Some("0.0.0.0"));
        assert_eq!(overrides.port.as_deref(), Some("8080"));
        assert_eq!(overrides.admin_key.as_deref(), Some("secret"));

        let mut config = Config::default();
        config.apply_override(overrides).unwrap();
        assert_eq!(config.listen_addr().to_string(), "0.0.0.0:8080");
        assert_eq!(config.admin_key(), Some("secret"));
    }

    #[test]
    fn test_init_config_refuses_overwrite() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config");

        init_config(&path).unwrap();
        assert!(Config::config_exists(&path));
        assert!(init_config(&path).is_err());
    }
}
