//! ACCESS patient calls main executable

pub mod bams;
pub mod biometrics;
pub mod cnas;
pub mod common;
pub mod err;
pub mod facets;
pub mod msi;
pub mod patient;
pub mod snvs;
pub mod strucvars;

use clap::{Args, Parser, Subcommand};
use console::{Emoji, Term};

/// CLI parser based on clap.
#[derive(Debug, Parser)]
#[command(
    author,
    version,
    about = "Per-patient ACCESS/IMPACT call reconciliation",
    long_about = "This tool collects, reconciles and filters the SNV/indel, CNA, SV and MSI \
                  calls of one patient across research ACCESS and clinical ACCESS/IMPACT samples"
)]
struct Cli {
    /// Commonly used arguments
    #[command(flatten)]
    common: common::Args,

    /// The sub command to run
    #[command(subcommand)]
    command: Commands,
}

/// Enum supporting the parsing of top-level commands.
#[allow(clippy::large_enum_variant)]
#[derive(Debug, Subcommand)]
enum Commands {
    /// Patient sample manifest commands.
    Samples(Samples),
    /// BAM path related commands.
    Bams(Bams),
    /// FACETS related commands.
    Facets(Facets),
    /// SNV/indel related commands.
    Snvs(Snvs),
    /// CNA related commands.
    Cnas(Cnas),
    /// SV related commands.
    Svs(Svs),
    /// MSI related commands.
    Msi(Msi),
    /// Biometrics related commands.
    Biometrics(Biometrics),
}

/// Parsing of "samples *" sub commands.
#[derive(Debug, Args)]
#[command(args_conflicts_with_subcommands = true)]
struct Samples {
    /// The sub command to run
    #[command(subcommand)]
    command: SamplesCommands,
}

/// Enum supporting the parsing of "samples *" sub commands.
#[derive(Debug, Subcommand)]
enum SamplesCommands {
    Infer(patient::infer::Args),
}

/// Parsing of "bams *" sub commands.
#[derive(Debug, Args)]
#[command(args_conflicts_with_subcommands = true)]
struct Bams {
    /// The sub command to run
    #[command(subcommand)]
    command: BamsCommands,
}

/// Enum supporting the parsing of "bams *" sub commands.
#[derive(Debug, Subcommand)]
enum BamsCommands {
    GenotypingInput(bams::genotyping::Args),
    BiometricsInput(bams::biometrics_input::Args),
}

/// Parsing of "facets *" sub commands.
#[derive(Debug, Args)]
#[command(args_conflicts_with_subcommands = true)]
struct Facets {
    /// The sub command to run
    #[command(subcommand)]
    command: FacetsCommands,
}

/// Enum supporting the parsing of "facets *" sub commands.
#[derive(Debug, Subcommand)]
enum FacetsCommands {
    Fit(facets::fit::Args),
}

/// Parsing of "snvs *" sub commands.
#[derive(Debug, Args)]
#[command(args_conflicts_with_subcommands = true)]
struct Snvs {
    /// The sub command to run
    #[command(subcommand)]
    command: SnvsCommands,
}

/// Enum supporting the parsing of "snvs *" sub commands.
#[derive(Debug, Subcommand)]
enum SnvsCommands {
    Union(snvs::union::Args),
    Aggregate(snvs::aggregate::Args),
    Annotate(snvs::annotate::Args),
    FacetsVaf(snvs::facets_vaf::Args),
    Filter(snvs::filter::Args),
    Pivot(snvs::pivot::Args),
    ToMaf(snvs::to_maf::Args),
}

/// Parsing of "cnas *" sub commands.
#[derive(Debug, Args)]
#[command(args_conflicts_with_subcommands = true)]
struct Cnas {
    /// The sub command to run
    #[command(subcommand)]
    command: CnasCommands,
}

/// Enum supporting the parsing of "cnas *" sub commands.
#[derive(Debug, Subcommand)]
enum CnasCommands {
    Call(cnas::call::Args),
}

/// Parsing of "svs *" sub commands.
#[derive(Debug, Args)]
#[command(args_conflicts_with_subcommands = true)]
struct Svs {
    /// The sub command to run
    #[command(subcommand)]
    command: SvsCommands,
}

/// Enum supporting the parsing of "svs *" sub commands.
#[derive(Debug, Subcommand)]
enum SvsCommands {
    Call(strucvars::call::Args),
}

/// Parsing of "msi *" sub commands.
#[derive(Debug, Args)]
#[command(args_conflicts_with_subcommands = true)]
struct Msi {
    /// The sub command to run
    #[command(subcommand)]
    command: MsiCommands,
}

/// Enum supporting the parsing of "msi *" sub commands.
#[derive(Debug, Subcommand)]
enum MsiCommands {
    Call(msi::call::Args),
}

/// Parsing of "biometrics *" sub commands.
#[derive(Debug, Args)]
#[command(args_conflicts_with_subcommands = true)]
struct Biometrics {
    /// The sub command to run
    #[command(subcommand)]
    command: BiometricsCommands,
}

/// Enum supporting the parsing of "biometrics *" sub commands.
#[derive(Debug, Subcommand)]
enum BiometricsCommands {
    Summarize(biometrics::summarize::Args),
}

fn main() -> Result<(), anyhow::Error> {
    let cli = Cli::parse();

    // Build a tracing subscriber according to the configuration in `cli.common`.
    let collector = tracing_subscriber::fmt()
        .with_target(false)
        .with_max_level(match cli.common.verbose.log_level() {
            Some(level) => match level {
                log::Level::Error => tracing::Level::ERROR,
                log::Level::Warn => tracing::Level::WARN,
                log::Level::Info => tracing::Level::INFO,
                log::Level::Debug => tracing::Level::DEBUG,
                log::Level::Trace => tracing::Level::TRACE,
            },
            None => tracing::Level::INFO,
        })
        .compact()
        .finish();

    // Install collector and go into sub commands.
    let term = Term::stderr();
    tracing::subscriber::with_default(collector, || {
        match &cli.command {
            Commands::Samples(samples) => match &samples.command {
                SamplesCommands::Infer(args) => patient::infer::run(&cli.common, args)?,
            },
            Commands::Bams(bams) => match &bams.command {
                BamsCommands::GenotypingInput(args) => bams::genotyping::run(&cli.common, args)?,
                BamsCommands::BiometricsInput(args) => {
                    bams::biometrics_input::run(&cli.common, args)?
                }
            },
            Commands::Facets(facets) => match &facets.command {
                FacetsCommands::Fit(args) => facets::fit::run(&cli.common, args)?,
            },
            Commands::Snvs(snvs) => match &snvs.command {
                SnvsCommands::Union(args) => snvs::union::run(&cli.common, args)?,
                SnvsCommands::Aggregate(args) => snvs::aggregate::run(&cli.common, args)?,
                SnvsCommands::Annotate(args) => snvs::annotate::run(&cli.common, args)?,
                SnvsCommands::FacetsVaf(args) => snvs::facets_vaf::run(&cli.common, args)?,
                SnvsCommands::Filter(args) => snvs::filter::run(&cli.common, args)?,
                SnvsCommands::Pivot(args) => snvs::pivot::run(&cli.common, args)?,
                SnvsCommands::ToMaf(args) => snvs::to_maf::run(&cli.common, args)?,
            },
            Commands::Cnas(cnas) => match &cnas.command {
                CnasCommands::Call(args) => cnas::call::run(&cli.common, args)?,
            },
            Commands::Svs(svs) => match &svs.command {
                SvsCommands::Call(args) => strucvars::call::run(&cli.common, args)?,
            },
            Commands::Msi(msi) => match &msi.command {
                MsiCommands::Call(args) => msi::call::run(&cli.common, args)?,
            },
            Commands::Biometrics(biometrics) => match &biometrics.command {
                BiometricsCommands::Summarize(args) => {
                    biometrics::summarize::run(&cli.common, args)?
                }
            },
        }

        Ok::<(), anyhow::Error>(())
    })?;
    term.write_line(&format!("All done. Have a nice day!{}", Emoji(" 😃", "")))?;

    Ok(())
}
