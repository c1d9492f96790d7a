// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at http://mozilla.org/MPL/2.0/.

//! Command-line interface code.
//!
//! Only a few things should be public in this module: `Viscal`, `Viscal::run`
//! and the argument errors that `ViscalError` wraps.

mod error;

pub use error::PlanArgsError;

use std::path::PathBuf;

use clap::{AppSettings, Args, Parser, Subcommand};
use itertools::Itertools;
use log::{debug, info};

use crate::{config::ViscalConfig, ViscalError};

// Add build-time information from the "built" crate.
include!(concat!(env!("OUT_DIR"), "/built.rs"));

#[derive(Debug, Parser)]
#[clap(
    version,
    author,
    about = r#"Calibration-matrix application and channel transforms for radio-interferometer visibilities"#
)]
#[clap(global_setting(AppSettings::DeriveDisplayOrder))]
#[clap(disable_help_subcommand = true)]
#[clap(infer_subcommands = true)]
#[clap(propagate_version = true)]
#[clap(infer_long_args = true)]
pub struct Viscal {
    #[clap(flatten)]
    global_opts: GlobalArgs,

    #[clap(subcommand)]
    command: Command,
}

#[derive(Debug, Args)]
struct GlobalArgs {
    /// The verbosity of the program. Increase by specifying multiple times
    /// (e.g. -vv). The default is to print only high-level information.
    #[clap(short, long, parse(from_occurrences))]
    #[clap(global = true)]
    verbosity: u8,

    /// Only verify that the configuration was correctly ingested and print
    /// out high-level information.
    #[clap(long)]
    #[clap(global = true)]
    dry_run: bool,

    /// Save the effective configuration (including defaults) into a new TOML
    /// file.
    #[clap(long)]
    #[clap(global = true)]
    save_toml: Option<PathBuf>,
}

#[derive(Debug, Subcommand)]
#[clap(arg_required_else_help = true)]
enum Command {
    #[clap(about = "Report what a configuration would do to a channelisation.")]
    Plan(PlanArgs),
}

#[derive(Debug, Args)]
struct PlanArgs {
    /// The configuration file; toml or json.
    #[clap(name = "CONFIG_FILE", parse(from_os_str))]
    config: PathBuf,

    /// The centre frequency of the first input channel [Hz].
    #[clap(long)]
    first_freq: f64,

    /// The input channel resolution [Hz]. May be negative.
    #[clap(long)]
    freq_res: f64,

    /// The number of input channels.
    #[clap(long)]
    num_chans: usize,
}

impl PlanArgs {
    fn input_freqs(&self) -> Result<Vec<f64>, PlanArgsError> {
        if self.num_chans == 0 {
            return Err(PlanArgsError::NoChannels);
        }
        if !self.first_freq.is_finite() {
            return Err(PlanArgsError::BadFirstFreq(self.first_freq));
        }
        if !self.freq_res.is_finite() || self.freq_res == 0.0 {
            return Err(PlanArgsError::BadFreqRes(self.freq_res));
        }
        Ok((0..self.num_chans)
            .map(|i| self.first_freq + i as f64 * self.freq_res)
            .collect())
    }

    fn run(&self, config: &ViscalConfig, dry_run: bool) -> Result<(), ViscalError> {
        let in_freqs = self.input_freqs()?;
        let transform = config.channel_transform()?;
        let fitter = config.continuum_fitter()?;

        info!("Input channels: {}", in_freqs.len());
        info!("Channel transform: {}", transform.composition());
        info!(
            "Continuum fit order {}, channels: {}",
            fitter.order(),
            if config.fit.fit_chans.is_empty() {
                "all".to_string()
            } else {
                config
                    .fit
                    .fit_chans
                    .iter()
                    .map(|[first, last]| format!("{first}-{last}"))
                    .join(", ")
            }
        );
        info!(
            "Calibration: {} (update weights: {}, via Mueller: {})",
            config.apply.direction, config.apply.update_weights, config.apply.via_mueller
        );
        if dry_run {
            info!("Dry run -- exiting now.");
            return Ok(());
        }

        let out_freqs = transform.output_freqs(&in_freqs)?;
        info!("Output channels: {}", out_freqs.len());
        info!(
            "    first: {:.3} MHz, last: {:.3} MHz",
            out_freqs.first() / 1e6,
            out_freqs.last() / 1e6
        );
        if out_freqs.len() > 1 {
            info!(
                "    resolution: {:.3} kHz",
                (out_freqs[1] - out_freqs[0]) / 1e3
            );
        }
        for (i, f) in out_freqs.iter().enumerate() {
            debug!("    {i:>5}: {f} Hz");
        }
        Ok(())
    }
}

impl Viscal {
    pub fn run(self) -> Result<(), ViscalError> {
        let GlobalArgs {
            verbosity,
            dry_run,
            save_toml,
        } = self.global_opts;
        setup_logging(verbosity)
            .map_err(|e| ViscalError::Generic(format!("Failed to initialise logging: {e}")))?;

        let sub_command = match &self.command {
            Command::Plan(_) => "plan",
        };
        info!("viscal {} {}", sub_command, env!("CARGO_PKG_VERSION"));
        display_build_info();

        match self.command {
            Command::Plan(args) => {
                let config = ViscalConfig::from_file(&args.config)?;
                if let Some(toml) = save_toml {
                    use std::{
                        fs::File,
                        io::{BufWriter, Write},
                    };

                    let toml_str = toml::to_string(&config)
                        .map_err(|e| ViscalError::Generic(format!("toml serialisation error: {e}")))?;
                    let mut f = BufWriter::new(File::create(toml)?);
                    f.write_all(toml_str.as_bytes())?;
                }
                args.run(&config, dry_run)?;
            }
        }

        info!("viscal {} complete.", sub_command);
        Ok(())
    }
}

/// Activate a logger. All log messages are put onto `stdout`. `env_logger`
/// automatically only uses colours and fancy symbols if we're on a tty (e.g. a
/// terminal); piped output will be formatted sensibly. Source code lines are
/// displayed in log messages when verbosity >= 3.
fn setup_logging(verbosity: u8) -> Result<(), log::SetLoggerError> {
    let mut builder = env_logger::Builder::from_default_env();
    builder.target(env_logger::Target::Stdout);
    builder.format_target(false);
    match verbosity {
        0 => builder.filter_level(log::LevelFilter::Info),
        1 => builder.filter_level(log::LevelFilter::Debug),
        2 => builder.filter_level(log::LevelFilter::Trace),
        _ => {
            builder.filter_level(log::LevelFilter::Trace);
            builder.format(|buf, record| {
                use std::io::Write;

                let timestamp = buf.timestamp();
                let level = record.level();
                let target = record.target();
                let line = record.line().unwrap_or(0);
                let message = record.args();

                writeln!(buf, "[{timestamp} {level} {target}:{line}] {message}")
            })
        }
    };
    builder.try_init()
}

/// Write many info-level log lines of how this executable was compiled.
fn display_build_info() {
    let dirty = match GIT_DIRTY {
        Some(true) => " (dirty)",
        _ => "",
    };
    match GIT_COMMIT_HASH_SHORT {
        Some(hash) => {
            info!("Compiled on git commit hash: {hash}{dirty}");
        }
        None => info!("Compiled on git commit hash: <no git info>"),
    }
    if let Some(hr) = GIT_HEAD_REF {
        info!("            git head ref: {}", hr);
    }
    info!("            {}", BUILT_TIME_UTC);
    info!("         with compiler {}", RUSTC_VERSION);
    info!("");
}
