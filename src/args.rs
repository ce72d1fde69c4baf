use std::env;
use std::path::PathBuf;

#[derive(Debug, Clone, PartialEq)]
pub enum Mode {
    /// Tick forever until stopped
    Watch,
    /// A single detection tick, then exit
    Once,
    /// Load and validate the config, then exit
    CheckConfig,
}

#[derive(Debug, PartialEq)]
pub struct Args {
    pub mode: Mode,
    pub config_path: Option<PathBuf>,
    pub debug_mode: bool,
    pub timeout_secs: Option<u64>,
}

impl Args {
    pub fn parse() -> Option<Self> {
        Self::parse_from(env::args().skip(1))
    }

    /// Parse flags (program name already skipped). `None` means exit now.
    pub fn parse_from(args: impl IntoIterator<Item = String>) -> Option<Self> {
        let mut mode = Mode::Watch;
        let mut config_path: Option<PathBuf> = None;
        let mut debug_mode = false;
        let mut timeout_secs: Option<u64> = None;

        for arg in args {
            if arg == "--help" || arg == "-h" {
                print_help();
                return None;
            } else if arg == "--version" || arg == "-v" {
                println!(
                    "Tab Warden v{} ({})",
                    env!("TAB_WARDEN_VERSION"),
                    env!("TAB_WARDEN_BUILD_DATE")
                );
                return None;
            } else if arg == "--debug" {
                debug_mode = true;
            } else if arg == "--once" {
                mode = Mode::Once;
            } else if arg == "--check-config" {
                mode = Mode::CheckConfig;
            } else if let Some(path) = arg.strip_prefix("--config=") {
                if path.is_empty() {
                    eprintln!("❌ --config needs a file path");
                    return None;
                }
                config_path = Some(PathBuf::from(path));
            } else if let Some(val) = arg.strip_prefix("--timeout=") {
                match val.parse::<u64>() {
                    Ok(secs) => timeout_secs = Some(secs),
                    Err(_) => {
                        eprintln!("❌ Invalid timeout value: {}", val);
                        return None;
                    }
                }
            } else {
                eprintln!("❌ Unknown argument: {}", arg);
                print_help();
                return None;
            }
        }

        Some(Args {
            mode,
            config_path,
            debug_mode,
            timeout_secs,
        })
    }
}

fn print_help() {
    println!("🛡️ Tab Warden - stuck-state watchdog for multi-tab game clients");
    println!();
    println!("USAGE:");
    println!("    tab-warden [FLAGS]");
    println!();
    println!("FLAGS:");
    println!("    --config=PATH       JSON detection config (default: built-in defaults)");
    println!("    --once              Run a single detection tick and exit");
    println!("    --check-config      Validate the config and its template images, then exit");
    println!("    --debug             Enable debug logging");
    println!("    --timeout=N         Stop after N seconds");
    println!("    --help, -h          Show this help message");
    println!("    --version, -v       Show version information");
    println!();
    println!("EXAMPLES:");
    println!("    tab-warden --config=warden.json");
    println!("    tab-warden --config=warden.json --once --debug");
    println!("    tab-warden --config=warden.json --check-config");
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(args: &[&str]) -> Option<Args> {
        Args::parse_from(args.iter().map(|s| s.to_string()))
    }

    #[test]
    fn test_defaults() {
        let args = parse(&[]).unwrap();
        assert_eq!(args.mode, Mode::Watch);
        assert_eq!(args.config_path, None);
        assert!(!args.debug_mode);
        assert_eq!(args.timeout_secs, None);
    }

    #[test]
    fn test_all_flags() {
        let args = parse(&["--config=warden.json", "--once", "--debug", "--timeout=90"]).unwrap();
        assert_eq!(args.mode, Mode::Once);
        assert_eq!(args.config_path, Some(PathBuf::from("warden.json")));
        assert!(args.debug_mode);
        assert_eq!(args.timeout_secs, Some(90));
    }

    #[test]
    fn test_rejects_bad_input() {
        assert!(parse(&["--timeout=soon"]).is_none());
        assert!(parse(&["--config="]).is_none());
        assert!(parse(&["--bogus"]).is_none());
    }
}
