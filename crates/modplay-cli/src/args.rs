//! Command-line argument parsing for the module player CLI.
//!
//! This module handles parsing and validation of CLI arguments including:
//! - File path specification
//! - Output volume and configuration file
//! - Help text generation

use std::env;
use std::path::PathBuf;

/// Parsed command-line arguments.
#[derive(Debug, Default, PartialEq)]
pub struct CliArgs {
    /// Module file to play
    pub file_path: Option<PathBuf>,
    /// Output volume override (0.0 to 1.0)
    pub volume: Option<f32>,
    /// JSON player configuration
    pub config_path: Option<PathBuf>,
    /// Print the supported extensions and exit
    pub list_extensions: bool,
    /// Whether help was requested
    pub show_help: bool,
}

impl CliArgs {
    /// Parse arguments from command line.
    pub fn parse() -> Self {
        Self::parse_from(env::args().skip(1))
    }

    /// Parse an argument list (without the program name).
    pub fn parse_from(arguments: impl IntoIterator<Item = String>) -> Self {
        let mut args = Self::default();
        let mut iter = arguments.into_iter();

        while let Some(arg) = iter.next() {
            match arg.as_str() {
                "--help" | "-h" => {
                    args.show_help = true;
                }
                "--list-extensions" => {
                    args.list_extensions = true;
                }
                "--volume" => match iter.next() {
                    Some(value) => args.set_volume(&value),
                    None => {
                        eprintln!("--volume requires an argument (0.0-1.0)");
                        args.show_help = true;
                    }
                },
                _ if arg.starts_with("--volume=") => {
                    let value = &arg["--volume=".len()..];
                    args.set_volume(value);
                }
                "--config" => match iter.next() {
                    Some(value) => args.config_path = Some(PathBuf::from(value)),
                    None => {
                        eprintln!("--config requires a file argument");
                        args.show_help = true;
                    }
                },
                _ if arg.starts_with('-') => {
                    eprintln!("Unknown flag: {}", arg);
                    args.show_help = true;
                }
                _ => {
                    args.file_path = Some(PathBuf::from(arg));
                }
            }
        }

        args
    }

    fn set_volume(&mut self, value: &str) {
        match value.parse::<f32>() {
            Ok(volume) if (0.0..=1.0).contains(&volume) => self.volume = Some(volume),
            _ => {
                eprintln!("Invalid volume: {} (expected 0.0-1.0)", value);
                self.show_help = true;
            }
        }
    }

    /// Print help text to stderr.
    pub fn print_help() {
        eprintln!(
            "Usage:\n  modplay [--volume <0.0-1.0>] [--config <file.json>] <file>\n\n\
             Flags:\n\
             \x20 --volume <v>         Output volume (default 1.0)\n\
             \x20 --config <file>      Load player configuration from JSON\n\
             \x20 --list-extensions    Print recognised module extensions\n\
             \x20 -h, --help           Show this help\n\n\
             Keys:\n\
             \x20 [space] play/pause   [s] stop   [p] play\n\
             \x20 [n]/[b] next/previous position   [left]/[right] seek 5s\n\
             \x20 [1-9] toggle channel mute   [q] quit\n\n\
             Examples:\n\
             \x20 modplay song.mod                  # Play a ProTracker module\n\
             \x20 modplay song.wav                  # Play a WAV render\n\
             \x20 modplay --volume 0.5 song.mod     # Half volume\n"
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(args: &[&str]) -> CliArgs {
        CliArgs::parse_from(args.iter().map(|arg| arg.to_string()))
    }

    #[test]
    fn file_and_volume() {
        let args = parse(&["--volume", "0.25", "tune.wav"]);
        assert_eq!(args.file_path, Some(PathBuf::from("tune.wav")));
        assert_eq!(args.volume, Some(0.25));
        assert!(!args.show_help);
    }

    #[test]
    fn volume_with_equals() {
        assert_eq!(parse(&["--volume=1"]).volume, Some(1.0));
    }

    #[test]
    fn out_of_range_volume_shows_help() {
        let args = parse(&["--volume", "3", "tune.wav"]);
        assert_eq!(args.volume, None);
        assert!(args.show_help);
    }

    #[test]
    fn unknown_flag_shows_help() {
        assert!(parse(&["--loud"]).show_help);
        assert!(parse(&["--config"]).show_help);
    }

    #[test]
    fn list_extensions() {
        let args = parse(&["--list-extensions"]);
        assert!(args.list_extensions);
        assert_eq!(args.file_path, None);
    }
}
