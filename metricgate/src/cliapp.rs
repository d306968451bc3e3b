//! This module implements the definition of the command line app.

use std::path::PathBuf;

use clap::builder::PossibleValuesParser;
use clap::{Arg, Command, value_parser};

pub const VERSION: &str = env!("CARGO_PKG_VERSION");
pub const ABOUT: &str = "Metricgate is a multi-tenant metrics ingestion gateway.";

pub fn make_app() -> Command {
    Command::new("metricgate")
        .disable_help_subcommand(true)
        .subcommand_required(true)
        .arg_required_else_help(true)
        .propagate_version(true)
        .max_term_width(79)
        .version(VERSION)
        .about(ABOUT)
        .arg(
            Arg::new("config")
                .value_name("CONFIG")
                .long("config")
                .short('c')
                .global(true)
                .value_parser(value_parser!(PathBuf))
                .help("The path to the config folder."),
        )
        .subcommand(
            Command::new("run")
                .about("Run the gateway")
                .after_help(
                    "This runs the gateway in the foreground until it's shut down. It will bind \
                     to the port and network interface configured in the config file.",
                )
                .arg(
                    Arg::new("host")
                        .long("host")
                        .short('H')
                        .value_name("HOST")
                        .env("METRICGATE_HOST")
                        .help("The network interface the gateway binds to."),
                )
                .arg(
                    Arg::new("port")
                        .long("port")
                        .short('P')
                        .value_name("PORT")
                        .env("METRICGATE_PORT")
                        .help("The port the gateway binds to."),
                )
                .arg(
                    Arg::new("publish_url")
                        .long("publish-url")
                        .value_name("URL")
                        .env("METRICGATE_PUBLISH_URL")
                        .help("The URL receiving published batches."),
                )
                .arg(
                    Arg::new("admin_key")
                        .long("admin-key")
                        .value_name("KEY")
                        .env("METRICGATE_ADMIN_KEY")
                        .hide_env_values(true)
                        .help("The key authenticating the administrative caller."),
                )
                .arg(
                    Arg::new("shutdown_timeout")
                        .long("shutdown-timeout")
                        .value_name("SECONDS")
                        .env("METRICGATE_SHUTDOWN_TIMEOUT")
                        .help("Maximum number of seconds to drain in-flight requests on shutdown."),
                ),
        )
        .subcommand(
            Command::new("config")
                .about("Manage the gateway config")
                .after_help(
                    "This command provides basic config management. It can be used primarily \
                     to initialize a new gateway config and to print out the current config.",
                )
                .subcommand_required(true)
                .arg_required_else_help(true)
                .subcommand(
                    Command::new("init")
                        .about("Initialize a new gateway config")
                        .after_help(
                            "This writes a config file with default values into the config \
                             folder. It fails if a config already exists.",
                        ),
                )
                .subcommand(
                    Command::new("show")
                        .about("Show the entire config out for debugging purposes")
                        .after_help(
                            "This dumps out the entire config including the values which are \
                             not in the config file but filled in from defaults. The default \
                             output format is YAML but a debug format can also be specified \
                             which is useful to understand how the gateway interprets the \
                             individual values.",
                        )
                        .arg(
                            Arg::new("format")
                                .short('f')
                                .long("format")
                                .value_parser(PossibleValuesParser::new(["debug", "yaml"]))
                                .default_value("yaml")
                                .help("The output format"),
                        ),
                ),
        )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_app_is_valid() {
        make_app().debug_assert();
    }
}
