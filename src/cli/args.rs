//! Command-line argument definitions using clap.

use std::net::IpAddr;
use std::path::PathBuf;

use clap::{Args, Parser, Subcommand};

/// Local certificate authority manager.
///
/// Creates a self-signed root CA, issues SAN certificates signed by it and
/// packages them as PEM, full chain and PKCS#12. Run without a subcommand
/// for the interactive menu.
#[derive(Parser, Debug)]
#[command(name = "localca")]
#[command(author, version, about, long_about = None)]
#[command(propagate_version = true)]
pub struct Cli {
    /// PKI store directory (or set LOCALCA_BASE_DIR)
    #[arg(short, long, env = "LOCALCA_BASE_DIR", global = true)]
    pub base_dir: Option<PathBuf>,

    /// Configuration file (defaults to the platform config directory)
    #[arg(short, long, global = true)]
    pub config: Option<PathBuf>,

    /// RSA key size for newly generated keys
    #[arg(long, global = true)]
    pub key_bits: Option<usize>,

    /// Increase verbosity
    #[arg(short, long, global = true)]
    pub verbose: bool,

    #[command(subcommand)]
    pub command: Option<Commands>,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Create the root CA (replacing an existing one needs --force)
    Init(InitArgs),

    /// Issue a certificate for a domain, optionally with an IP address
    Issue(IssueArgs),

    /// Reissue a domain's certificate with a new key pair
    Renew(RenewArgs),

    /// Show the store layout
    Layout,
}

#[derive(Args, Debug)]
pub struct InitArgs {
    /// Two-letter country code (C)
    #[arg(long)]
    pub country: Option<String>,

    /// State or province (ST)
    #[arg(long)]
    pub state: Option<String>,

    /// City (L)
    #[arg(long)]
    pub locality: Option<String>,

    /// Organization (O)
    #[arg(long)]
    pub organization: Option<String>,

    /// Common name (CN) of the root
    #[arg(long)]
    pub common_name: Option<String>,

    /// Validity in days
    #[arg(long)]
    pub days: Option<u32>,

    /// Replace an existing root; certificates issued by it stop validating
    #[arg(long)]
    pub force: bool,
}

#[derive(Args, Debug)]
pub struct IssueArgs {
    /// Domain name or wildcard pattern such as *.example.com
    pub domain: String,

    /// IP address to add as a subject alternative name
    #[arg(long)]
    pub ip: Option<IpAddr>,

    /// Validity in days
    #[arg(long)]
    pub days: Option<u32>,

    /// PKCS#12 export password (empty if omitted)
    #[arg(long, env = "LOCALCA_PKCS12_PASSWORD", default_value = "", hide_env_values = true)]
    pub pkcs12_password: String,
}

#[derive(Args, Debug)]
pub struct RenewArgs {
    /// Domain name or wildcard pattern that was issued before
    pub domain: String,

    /// PKCS#12 export password (empty if omitted)
    #[arg(long, env = "LOCALCA_PKCS12_PASSWORD", default_value = "", hide_env_values = true)]
    pub pkcs12_password: String,
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn definition_is_consistent() {
        Cli::command().debug_assert();
    }

    #[test]
    fn parses_issue_with_ip() {
        let cli = Cli::try_parse_from([
            "localca",
            "--base-dir",
            "/tmp/pki",
            "issue",
            "svc.local",
            "--ip",
            "10.0.0.5",
            "--days",
            "30",
        ])
        .unwrap();
        assert_eq!(cli.base_dir, Some(PathBuf::from("/tmp/pki")));
        match cli.command {
            Some(Commands::Issue(args)) => {
                assert_eq!(args.domain, "svc.local");
                assert_eq!(args.ip, Some("10.0.0.5".parse().unwrap()));
                assert_eq!(args.days, Some(30));
            }
            other => panic!("unexpected command {other:?}"),
        }
    }

    #[test]
    fn no_subcommand_means_menu() {
        let cli = Cli::try_parse_from(["localca"]).unwrap();
        assert!(cli.command.is_none());
    }
}
