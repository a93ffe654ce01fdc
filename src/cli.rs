use crate::config::{DEFAULT_HOST, DiscoveryConfig, RESULTS_FILE_NAME};
use crate::constraints::{Bound, ConstraintBuilder, GroupField};
use crate::export::export_csv;
use crate::locator::ServiceLocator;
use crate::render::render_summary;
use crate::transport::{UploadFile, UploadTransport};
use anyhow::Context;
use clap::{Args, Parser, Subcommand};
use log::{debug, info, warn};
use std::path::PathBuf;

#[derive(Parser, Debug)]
#[command(name = "smart_groups", version, about = "Split a roster into groups with a remote solver")]
pub struct Cli {
    #[command(subcommand)]
    pub command: Command,

    /// Host the backend runs on
    #[arg(long, global = true, default_value = DEFAULT_HOST)]
    pub host: String,

    /// Use this backend port and skip discovery
    #[arg(long, global = true)]
    pub port: Option<u16>,

    /// Port to probe during discovery (repeatable, replaces the defaults)
    #[arg(long = "candidate-port", global = true, value_name = "PORT")]
    pub candidate_ports: Vec<u16>,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Upload a roster with constraints and write the grouped CSV
    Upload(UploadArgs),
    /// Check that the backend answers
    Health,
}

/// Form fields, taken as typed. Blank means unconstrained.
#[derive(Args, Debug)]
pub struct UploadArgs {
    /// Roster CSV
    pub file: PathBuf,

    /// Comma-separated binary attribute columns, e.g. "women, finance"
    #[arg(long, default_value = "")]
    pub attributes: String,

    #[arg(long, default_value = "", allow_hyphen_values = true)]
    pub group_size_min: String,

    #[arg(long, default_value = "", allow_hyphen_values = true)]
    pub group_size_max: String,

    #[arg(long, default_value = "", allow_hyphen_values = true)]
    pub group_count_min: String,

    #[arg(long, default_value = "", allow_hyphen_values = true)]
    pub group_count_max: String,

    /// At least N students with ATTR per group
    #[arg(long = "min", value_name = "ATTR=N")]
    pub attribute_min: Vec<String>,

    /// At most N students with ATTR per group
    #[arg(long = "max", value_name = "ATTR=N")]
    pub attribute_max: Vec<String>,

    /// Quota over several attributes, e.g. "women,finance:1:3" or "tech::2"
    #[arg(long = "combined", value_name = "ATTRS:MIN:MAX")]
    pub combined: Vec<String>,

    /// Where to write the results
    #[arg(long, short, default_value = RESULTS_FILE_NAME)]
    pub output: PathBuf,
}

impl UploadArgs {
    /// Replays the flags into a builder the way a user would fill the form.
    pub fn to_builder(&self) -> ConstraintBuilder {
        let mut builder = ConstraintBuilder::new();
        builder.set_attribute_text(&self.attributes);
        builder.confirm_attributes();

        builder.set_group_field(GroupField::SizeMin, &self.group_size_min);
        builder.set_group_field(GroupField::SizeMax, &self.group_size_max);
        builder.set_group_field(GroupField::CountMin, &self.group_count_min);
        builder.set_group_field(GroupField::CountMax, &self.group_count_max);

        for (bound, entries) in [(Bound::Min, &self.attribute_min), (Bound::Max, &self.attribute_max)] {
            for entry in entries {
                match entry.split_once('=') {
                    Some((attr, raw)) => builder.set_attribute_bound(attr.trim(), bound, raw),
                    None => debug!("ignoring attribute bound without '=': {entry:?}"),
                }
            }
        }

        for entry in &self.combined {
            let mut parts = entry.splitn(3, ':');
            let attributes = parts.next().unwrap_or_default();
            let min = parts.next().unwrap_or_default();
            let max = parts.next().unwrap_or_default();

            let row = builder.add_combined();
            for attr in attributes.split(',').map(str::trim).filter(|a| !a.is_empty()) {
                builder.set_combined_attribute(row, attr, true);
            }
            builder.set_combined_bound(row, Bound::Min, min);
            builder.set_combined_bound(row, Bound::Max, max);
        }

        builder
    }
}

impl Cli {
    pub fn discovery_config(&self) -> DiscoveryConfig {
        let config = DiscoveryConfig::default().with_host(self.host.clone());
        if self.candidate_ports.is_empty() {
            config
        } else {
            config.with_candidates(self.candidate_ports.clone())
        }
    }

    pub fn locator(&self) -> ServiceLocator {
        match self.port {
            Some(port) => ServiceLocator::pinned_port(self.discovery_config(), port),
            None => ServiceLocator::new(self.discovery_config()),
        }
    }
}

pub async fn run(cli: Cli) -> anyhow::Result<()> {
    let transport = UploadTransport::new(cli.locator());

    match &cli.command {
        Command::Health => {
            let status = transport.check_health().await?;
            println!("{status}");
        }
        Command::Upload(args) => upload(&transport, args).await?,
    }

    if transport.locator().is_degraded() == Some(true) {
        warn!("No backend answered discovery; requests went to the fallback address");
    }
    Ok(())
}

async fn upload(transport: &UploadTransport, args: &UploadArgs) -> anyhow::Result<()> {
    // an unreadable path is reported as "no file"
    let file = match UploadFile::from_path(&args.file) {
        Ok(file) => Some(file),
        Err(e) => {
            warn!("could not open {}: {e}", args.file.display());
            None
        }
    };
    let spec = args.to_builder().build();

    let outcome = transport.submit(file.as_ref(), &spec).await?;
    println!("{}", outcome.message);
    print!("{}", render_summary(&outcome.data));

    let csv = export_csv(&outcome.data);
    if csv.is_empty() {
        info!("No students in the result; nothing written");
        return Ok(());
    }
    tokio::fs::write(&args.output, csv.as_bytes())
        .await
        .with_context(|| format!("could not write {}", args.output.display()))?;
    println!("Results written to {}", args.output.display());
    Ok(())
}
