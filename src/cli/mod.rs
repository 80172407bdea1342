//! CLI argument parsing and command dispatch.
//!
//! Everything here turns terminal input into typed values for the store
//! operations and renders their results. Validation itself happens in the
//! constructors of those values.

pub mod args;
pub mod menu;

use anyhow::{Context as _, Result};
use args::{Cli, Commands, InitArgs, IssueArgs, RenewArgs};
use colored::Colorize;
use tracing::debug;

use crate::config::Config;
use crate::domain::DomainName;
use crate::error::Error;
use crate::issue::{CertificateIssuer, IssuedCertificate, SubjectRequest};
use crate::layout::StoreLayout;
use crate::provider::{CryptoProvider, RustCryptoProvider};
use crate::root_ca::{Overwrite, RootCa, RootCaManager, RootCaParams};
use crate::store::PkiStore;

/// Everything a command needs: the store, the provider and the defaults.
pub struct Context {
    pub store: PkiStore,
    pub provider: RustCryptoProvider,
    pub config: Config,
}

impl Context {
    /// Resolves configuration with flags and environment taking precedence
    /// over the configuration file.
    pub fn from_cli(cli: &Cli) -> Result<Self> {
        let config = match &cli.config {
            Some(path) => Config::load_from(path)?,
            None => Config::load()?,
        };
        let base = cli
            .base_dir
            .clone()
            .unwrap_or_else(|| config.resolve_base_dir());
        let provider = RustCryptoProvider::new(cli.key_bits.unwrap_or(config.key_bits))?;
        debug!(base = %base.display(), bits = provider.key_bits, "resolved context");

        Ok(Self {
            store: PkiStore::new(base),
            provider,
            config,
        })
    }

    pub fn root_ca(&self) -> RootCaManager<'_, RustCryptoProvider> {
        RootCaManager::new(&self.store, &self.provider)
    }

    pub fn issuer(&self) -> CertificateIssuer<'_, RustCryptoProvider> {
        CertificateIssuer::new(&self.store, &self.provider)
    }
}

/// Run the CLI application.
pub fn run(cli: Cli) -> Result<()> {
    let ctx = Context::from_cli(&cli)?;

    // Nothing may touch the store before the provider is known to work.
    ctx.provider.check_available()?;
    ctx.store.ensure_layout()?;

    match cli.command {
        None => menu::run(&ctx),
        Some(Commands::Init(args)) => init(&ctx, args),
        Some(Commands::Issue(args)) => issue(&ctx, args),
        Some(Commands::Renew(args)) => renew(&ctx, args),
        Some(Commands::Layout) => layout(&ctx),
    }
}

fn init(ctx: &Context, args: InitArgs) -> Result<()> {
    let defaults = &ctx.config.subject;
    let country = args
        .country
        .or_else(|| defaults.country.clone())
        .ok_or_else(|| Error::InvalidInput("--country is required".to_string()))?;
    let common_name = args
        .common_name
        .or_else(|| defaults.common_name.clone())
        .ok_or_else(|| Error::InvalidInput("--common-name is required".to_string()))?;

    let params = RootCaParams::builder()
        .country(country)
        .maybe_state(args.state.or_else(|| defaults.state.clone()))
        .maybe_locality(args.locality.or_else(|| defaults.locality.clone()))
        .maybe_organization(args.organization.or_else(|| defaults.organization.clone()))
        .common_name(common_name)
        .validity_days(args.days.unwrap_or(ctx.config.root_validity_days))
        .build()?;

    let overwrite = if args.force {
        Overwrite::Confirmed
    } else {
        Overwrite::Deny
    };
    let root = ctx.root_ca().initialize(&params, overwrite)?;
    print_root(ctx, &root);
    Ok(())
}

fn issue(ctx: &Context, args: IssueArgs) -> Result<()> {
    let request = SubjectRequest::new(
        DomainName::parse(&args.domain)?,
        args.ip,
        args.days.unwrap_or(ctx.config.leaf_validity_days),
    )?;
    let issued = ctx.issuer().issue(&request, &args.pkcs12_password)?;
    print_issued(&issued);
    Ok(())
}

fn renew(ctx: &Context, args: RenewArgs) -> Result<()> {
    let domain = DomainName::parse(&args.domain)?;
    let issued = ctx
        .issuer()
        .renew(&domain, &args.pkcs12_password)
        .with_context(|| format!("renewing {domain}"))?;
    print_issued(&issued);
    Ok(())
}

fn layout(ctx: &Context) -> Result<()> {
    print!("{}", StoreLayout::scan(&ctx.store)?);
    Ok(())
}

pub(crate) fn print_root(ctx: &Context, root: &RootCa) {
    let cert = root.certificate();
    println!("{} Root CA created", "✓".green().bold());
    println!("  subject:     {}", cert.subject_name());
    println!("  valid until: {}", cert.validity().not_after.date());
    println!("  certificate: {}", root.cert_path().display());
    println!(
        "  Trust {} on every client; see {}",
        "rootCA.crt".cyan(),
        ctx.store.guide_path().display()
    );
}

pub(crate) fn print_issued(issued: &IssuedCertificate) {
    println!(
        "{} Issued {} (serial {})",
        "✓".green().bold(),
        issued.request.domain.to_string().bold(),
        issued.serial
    );
    println!("  valid until: {}", issued.certificate.validity().not_after.date());
    if let Ok(san) = issued.certificate.subject_alt_name() {
        println!("  names:       {san}");
    }
    println!("  directory:   {}", issued.directory.display());
}

/// Whether an error from a command must end the program rather than
/// return to the menu.
pub fn is_fatal(err: &anyhow::Error) -> bool {
    err.chain()
        .find_map(|cause| cause.downcast_ref::<Error>())
        .is_some_and(Error::is_fatal)
}

/// Whether the run ended because the crypto provider cannot work here.
pub fn is_dependency_missing(err: &anyhow::Error) -> bool {
    err.chain()
        .find_map(|cause| cause.downcast_ref::<Error>())
        .is_some_and(|e| matches!(e, Error::DependencyMissing(_)))
}
