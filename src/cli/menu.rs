//! The interactive menu shown when no subcommand is given.

use std::net::IpAddr;

use anyhow::Result;
use colored::Colorize;
use dialoguer::theme::ColorfulTheme;
use dialoguer::{Confirm, Input, Password, Select};

use super::{Context, is_fatal, print_issued, print_root};
use crate::domain::DomainName;
use crate::issue::SubjectRequest;
use crate::layout::StoreLayout;
use crate::root_ca::{MAX_VALIDITY_DAYS, Overwrite, RootCaParams};

const CHOICES: [&str; 5] = [
    "Initialize root CA",
    "Issue new certificate",
    "Renew / reissue certificate",
    "Display store layout",
    "Exit",
];

/// Loops until the operator exits or a fatal error occurs. Other errors are
/// reported and control returns to the menu.
pub fn run(ctx: &Context) -> Result<()> {
    let theme = ColorfulTheme::default();
    println!("{} {}", "localca".cyan().bold(), ctx.store.base().display());

    loop {
        println!();
        let choice = Select::with_theme(&theme)
            .with_prompt("What do you want to do?")
            .items(&CHOICES[..])
            .default(0)
            .interact()?;

        let outcome = match choice {
            0 => init(ctx, &theme),
            1 => issue(ctx, &theme),
            2 => renew(ctx, &theme),
            3 => layout(ctx),
            _ => return Ok(()),
        };

        if let Err(err) = outcome {
            if is_fatal(&err) {
                return Err(err);
            }
            eprintln!("{} {err:#}", "Error:".red().bold());
        }
    }
}

fn init(ctx: &Context, theme: &ColorfulTheme) -> Result<()> {
    let root_ca = ctx.root_ca();
    let overwrite = if root_ca.exists() {
        println!(
            "{} A root CA already exists. Replacing it makes every certificate it issued untrusted.",
            "Warning:".yellow().bold()
        );
        let confirmed = Confirm::with_theme(theme)
            .with_prompt("Replace the existing root CA?")
            .default(false)
            .interact()?;
        if !confirmed {
            println!("Keeping the existing root CA.");
            return Ok(());
        }
        Overwrite::Confirmed
    } else {
        Overwrite::Deny
    };

    let defaults = &ctx.config.subject;
    let country = prompt_text(theme, "Country code (2 letters)", defaults.country.as_deref(), false)?;
    let state = prompt_text(theme, "State or province", defaults.state.as_deref(), true)?;
    let locality = prompt_text(theme, "City", defaults.locality.as_deref(), true)?;
    let organization = prompt_text(theme, "Organization", defaults.organization.as_deref(), true)?;
    let common_name = prompt_text(theme, "Common name", defaults.common_name.as_deref(), false)?;
    let days = prompt_days(theme, ctx.config.root_validity_days)?;

    let params = RootCaParams::builder()
        .country(country)
        .state(state)
        .locality(locality)
        .organization(organization)
        .common_name(common_name)
        .validity_days(days)
        .build()?;

    println!("Generating {}-bit root key...", ctx.provider.key_bits);
    let root = root_ca.initialize(&params, overwrite)?;
    print_root(ctx, &root);
    Ok(())
}

fn issue(ctx: &Context, theme: &ColorfulTheme) -> Result<()> {
    let domain: String = Input::with_theme(theme)
        .with_prompt("Domain (e.g. app.local or *.example.com)")
        .validate_with(|input: &String| DomainName::parse(input).map(|_| ()).map_err(|e| e.to_string()))
        .interact_text()?;
    let ip: String = Input::with_theme(theme)
        .with_prompt("IP address (optional)")
        .allow_empty(true)
        .validate_with(|input: &String| {
            if input.trim().is_empty() || input.trim().parse::<IpAddr>().is_ok() {
                Ok(())
            } else {
                Err("not an IPv4 or IPv6 address")
            }
        })
        .interact_text()?;
    let days = prompt_days(theme, ctx.config.leaf_validity_days)?;
    let password = prompt_password(theme)?;

    let ip = match ip.trim() {
        "" => None,
        ip => Some(ip.parse()?),
    };
    let request = SubjectRequest::new(DomainName::parse(&domain)?, ip, days)?;

    println!("Generating {}-bit key for {}...", ctx.provider.key_bits, request.domain);
    let issued = ctx.issuer().issue(&request, &password)?;
    print_issued(&issued);
    Ok(())
}

fn renew(ctx: &Context, theme: &ColorfulTheme) -> Result<()> {
    let domains = ctx.store.issued_domains()?;
    if domains.is_empty() {
        println!("No certificates have been issued yet.");
        return Ok(());
    }
    let labels: Vec<String> = domains.iter().map(ToString::to_string).collect();
    let index = Select::with_theme(theme)
        .with_prompt("Domain to reissue")
        .items(&labels[..])
        .default(0)
        .interact()?;
    let password = prompt_password(theme)?;

    println!(
        "Reissuing {} with a new key. Redeploy the new files; the old certificate is not revoked.",
        domains[index]
    );
    let issued = ctx.issuer().renew(&domains[index], &password)?;
    print_issued(&issued);
    Ok(())
}

fn layout(ctx: &Context) -> Result<()> {
    print!("{}", StoreLayout::scan(&ctx.store)?);
    Ok(())
}

fn prompt_text(
    theme: &ColorfulTheme,
    prompt: &str,
    default: Option<&str>,
    optional: bool,
) -> Result<String> {
    let mut input = Input::<String>::with_theme(theme)
        .with_prompt(prompt)
        .allow_empty(optional);
    if let Some(default) = default {
        input = input.default(default.to_string());
    }
    Ok(input.interact_text()?.trim().to_string())
}

fn prompt_days(theme: &ColorfulTheme, default: u32) -> Result<u32> {
    Ok(Input::<u32>::with_theme(theme)
        .with_prompt("Validity (days)")
        .default(default)
        .validate_with(|days: &u32| {
            if (1..=MAX_VALIDITY_DAYS).contains(days) {
                Ok(())
            } else {
                Err(format!("must be between 1 and {MAX_VALIDITY_DAYS}"))
            }
        })
        .interact_text()?)
}

fn prompt_password(theme: &ColorfulTheme) -> Result<String> {
    Ok(Password::with_theme(theme)
        .with_prompt("PKCS#12 export password (empty for none)")
        .with_confirmation("Repeat password", "Passwords do not match")
        .allow_empty_password(true)
        .interact()?)
}
