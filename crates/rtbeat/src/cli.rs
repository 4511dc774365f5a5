//! Command line interface

use clap::{ArgAction, ArgMatches, Args, CommandFactory, FromArgMatches, Parser, Subcommand};
use std::ffi::OsString;
use rtbeat_control::{BodyEncoding, DispatchTarget, TransformMode};
use rtbeat_core::{BeatConfig, LogConfig, DEFAULT_BUFFER_SIZE, DEFAULT_HTTP_TIMEOUT_MS};
use std::path::PathBuf;

#[derive(Parser, Debug)]
#[command(name = "rtbeat")]
#[command(about = "Real-time beat detection and tempo dispatch", long_about = None)]
#[command(version)]
pub struct Cli {
    /// Log level (error, warn, info, debug, trace); RUST_LOG takes precedence
    #[arg(long, default_value = "info", global = true)]
    pub log_level: String,

    /// Also write session logs to this directory
    #[arg(long, global = true)]
    pub log_dir: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Option<Command>,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// List available input devices
    List,

    /// Detect beats and send tempo changes to the given servers
    Beat(BeatArgs),
}

#[derive(Args, Debug)]
pub struct BeatArgs {
    /// Samples per frame
    #[arg(short = 'b', long = "bufsize", default_value_t = DEFAULT_BUFFER_SIZE)]
    pub bufsize: usize,

    /// Input device index from `list` (default: system default)
    #[arg(short = 'd', long = "device")]
    pub device: Option<usize>,

    /// Print BPM and loudness on every beat
    #[arg(short = 'v', long = "verbose")]
    pub verbose: bool,

    /// `URL` of an HTTP beat generator, or `HOST PORT PATH [MODE]` of an OSC
    /// receiver (MODE: PLAIN, HALF or GMA3). Repeatable.
    #[arg(
        short = 's',
        long = "server",
        action = ArgAction::Append,
        num_args = 1..=4,
        value_names = ["URL|HOST", "PORT", "PATH", "MODE"]
    )]
    pub server: Vec<String>,

    /// `-s` values grouped per occurrence, filled by [`Cli::try_parse_grouped`]
    #[arg(skip)]
    pub servers: Vec<Vec<String>>,

    /// API key for the HTTP beat generator
    #[arg(short = 'k', long = "api-key")]
    pub api_key: Option<String>,

    /// HTTP request timeout in milliseconds
    #[arg(long = "timeout-ms", default_value_t = DEFAULT_HTTP_TIMEOUT_MS)]
    pub timeout_ms: u64,

    /// Send the HTTP body as JSON instead of a form
    #[arg(long = "json-body")]
    pub json_body: bool,
}

impl Cli {
    /// Parse `args`, keeping each `-s` occurrence as its own group
    pub fn try_parse_grouped<I, T>(args: I) -> Result<Self, clap::Error>
    where
        I: IntoIterator<Item = T>,
        T: Into<OsString> + Clone,
    {
        let matches = Self::command().try_get_matches_from(args)?;
        let mut cli = Self::from_arg_matches(&matches)?;
        if let (Some(Command::Beat(args)), Some(beat)) =
            (cli.command.as_mut(), matches.subcommand_matches("beat"))
        {
            args.servers = server_groups(beat);
        }
        Ok(cli)
    }

    /// [`try_parse_grouped`](Self::try_parse_grouped) on the process
    /// arguments, exiting on error
    pub fn parse_grouped() -> Self {
        Self::try_parse_grouped(std::env::args_os()).unwrap_or_else(|e| e.exit())
    }

    pub fn log_config(&self) -> LogConfig {
        let config = LogConfig::console(self.log_level.clone());
        match &self.log_dir {
            Some(dir) => config.with_file_output(dir),
            None => config,
        }
    }
}

impl BeatArgs {
    /// Dispatch targets from the `-s` groups. Errors are usage errors.
    pub fn targets(&self) -> Result<Vec<DispatchTarget>, String> {
        if self.servers.is_empty() {
            return Err("At least one server is required (-s)".to_string());
        }

        let mut targets = Vec::with_capacity(self.servers.len());
        let mut wants_key = false;
        for group in &self.servers {
            match group.as_slice() {
                [url] => {
                    wants_key = true;
                    let api_key = self
                        .api_key
                        .as_ref()
                        .ok_or_else(|| format!("Server {} requires an API key (-k)", url))?;
                    targets.push(DispatchTarget::http(url.as_str(), api_key.as_str()));
                }
                [host, port, path] => {
                    targets.push(DispatchTarget::message(
                        host.as_str(),
                        parse_port(port)?,
                        path.as_str(),
                        TransformMode::default(),
                    ));
                }
                [host, port, path, mode] => {
                    targets.push(DispatchTarget::message(
                        host.as_str(),
                        parse_port(port)?,
                        path.as_str(),
                        mode.parse::<TransformMode>()?,
                    ));
                }
                other => {
                    return Err(format!(
                        "Invalid server '{}': expected URL or HOST PORT PATH [MODE]",
                        other.join(" ")
                    ))
                }
            }
        }

        if self.api_key.is_some() && !wants_key {
            return Err("An API key (-k) requires an HTTP server URL (-s)".to_string());
        }

        for target in &targets {
            target.validate()?;
        }
        Ok(targets)
    }

    /// Immutable pipeline configuration
    pub fn to_config(&self) -> Result<BeatConfig, String> {
        if self.bufsize == 0 {
            return Err("Buffer size must be greater than zero".to_string());
        }
        if self.timeout_ms == 0 {
            return Err("Timeout must be greater than zero".to_string());
        }

        Ok(BeatConfig {
            buffer_size: self.bufsize,
            device: self.device,
            verbose: self.verbose,
            targets: self.targets()?,
            http_timeout_ms: self.timeout_ms,
            body_encoding: if self.json_body {
                BodyEncoding::Json
            } else {
                BodyEncoding::Form
            },
        })
    }
}

fn server_groups(matches: &ArgMatches) -> Vec<Vec<String>> {
    matches
        .get_occurrences::<String>("server")
        .map(|occurrences| {
            occurrences
                .map(|values| values.cloned().collect())
                .collect()
        })
        .unwrap_or_default()
}

fn parse_port(port: &str) -> Result<u16, String> {
    port.parse::<u16>()
        .map_err(|_| format!("Invalid port '{}'", port))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn beat_args(args: &[&str]) -> BeatArgs {
        let cli =
            Cli::try_parse_grouped(std::iter::once("rtbeat").chain(args.iter().copied())).unwrap();
        match cli.command {
            Some(Command::Beat(args)) => args,
            other => panic!("expected beat, got {:?}", other),
        }
    }

    #[test]
    fn test_defaults() {
        let args = beat_args(&["beat", "-s", "10.0.0.2", "8000", "/bpm"]);
        let config = args.to_config().unwrap();
        assert_eq!(config.buffer_size, 512);
        assert_eq!(config.device, None);
        assert!(!config.verbose);
        assert_eq!(config.http_timeout_ms, 2000);
        assert_eq!(config.body_encoding, BodyEncoding::Form);
        assert_eq!(
            config.targets,
            vec![DispatchTarget::message("10.0.0.2", 8000, "/bpm", TransformMode::Plain)]
        );
    }

    #[test]
    fn test_repeated_osc_servers() {
        let args = beat_args(&[
            "beat", "-b", "1024", "-d", "2", "-v", "-s", "10.0.0.2", "8000", "/gma3/Page1/Fader201",
            "gma3", "-s", "10.0.0.3", "9000", "/wled/bpm", "HALF",
        ]);
        let config = args.to_config().unwrap();
        assert_eq!(config.buffer_size, 1024);
        assert_eq!(config.device, Some(2));
        assert!(config.verbose);
        assert_eq!(config.targets.len(), 2);
        assert_eq!(config.targets[0].mode(), TransformMode::Gma3);
        assert_eq!(config.targets[1].mode(), TransformMode::Half);
    }

    #[test]
    fn test_server_values_are_grouped_per_occurrence() {
        let args = beat_args(&[
            "beat", "-s", "a", "1", "/p", "GMA3", "-s", "b", "2", "/q", "-s", "http://h", "-k",
            "secret",
        ]);
        assert_eq!(
            args.servers,
            vec![
                vec!["a", "1", "/p", "GMA3"],
                vec!["b", "2", "/q"],
                vec!["http://h"],
            ]
        );

        let targets = args.targets().unwrap();
        assert_eq!(
            targets,
            vec![
                DispatchTarget::message("a", 1, "/p", TransformMode::Gma3),
                DispatchTarget::message("b", 2, "/q", TransformMode::Plain),
                DispatchTarget::http("http://h", "secret"),
            ]
        );
    }

    #[test]
    fn test_more_than_four_values_is_a_parse_error() {
        let result = Cli::try_parse_grouped(["rtbeat", "beat", "-s", "a", "1", "/p", "GMA3", "extra"]);
        assert!(result.is_err());
    }

    #[test]
    fn test_http_server_with_key() {
        let args = beat_args(&[
            "beat", "-s", "http://aurora.local", "-k", "secret", "--json-body", "--timeout-ms", "500",
        ]);
        let config = args.to_config().unwrap();
        assert_eq!(
            config.targets,
            vec![DispatchTarget::http("http://aurora.local", "secret")]
        );
        assert_eq!(config.body_encoding, BodyEncoding::Json);
        assert_eq!(config.http_timeout_ms, 500);
    }

    #[test]
    fn test_http_server_without_key_is_rejected() {
        let args = beat_args(&["beat", "-s", "http://aurora.local"]);
        assert!(args.to_config().unwrap_err().contains("API key"));
    }

    #[test]
    fn test_key_without_http_server_is_rejected() {
        let args = beat_args(&["beat", "-s", "10.0.0.2", "8000", "/bpm", "-k", "secret"]);
        assert!(args.to_config().is_err());
    }

    #[test]
    fn test_two_values_are_rejected() {
        let args = beat_args(&["beat", "-s", "10.0.0.2", "8000"]);
        assert!(args.to_config().is_err());
    }

    #[test]
    fn test_bad_port_and_mode() {
        let args = beat_args(&["beat", "-s", "10.0.0.2", "eighty", "/bpm"]);
        assert!(args.to_config().unwrap_err().contains("port"));

        let args = beat_args(&["beat", "-s", "10.0.0.2", "8000", "/bpm", "double"]);
        assert!(args.to_config().unwrap_err().contains("Unknown mode"));
    }

    #[test]
    fn test_no_servers_is_rejected() {
        let args = beat_args(&["beat"]);
        assert!(args.to_config().is_err());
    }

    #[test]
    fn test_zero_bufsize_is_rejected() {
        let args = beat_args(&["beat", "-b", "0", "-s", "10.0.0.2", "8000", "/bpm"]);
        assert!(args.to_config().is_err());
    }

    #[test]
    fn test_no_subcommand() {
        let cli = Cli::try_parse_grouped(["rtbeat"]).unwrap();
        assert!(cli.command.is_none());
        assert!(!cli.log_config().file_output);
    }

    #[test]
    fn test_global_log_options() {
        let cli =
            Cli::try_parse_grouped(["rtbeat", "list", "--log-level", "debug", "--log-dir", "/tmp/rt"])
                .unwrap();
        assert!(matches!(cli.command, Some(Command::List)));
        let log = cli.log_config();
        assert_eq!(log.level, "debug");
        assert!(log.file_output);
        assert_eq!(log.log_directory, PathBuf::from("/tmp/rt"));
    }
}
