use std::process::ExitCode;

use anyhow::{Context, Result};
use clap::Parser;
use riffmeta::config::Options;
use riffmeta::sound::{self, Coefficients, StreamDescriptor};
use riffmeta::{logging, Cli};

fn main() -> Result<ExitCode> {
    let cli = Cli::parse();
    let options = cli.merge_into_options(Options::default())?;

    logging::init(options.log_level).context("Failed to install logger")?;
    log::debug!("Configuration: {:?}", options);

    let parse_options = options.parse_options();
    let mut failures = 0;

    for path in &cli.files {
        match sound::parse_file(path, &parse_options) {
            Ok(desc) => print_descriptor(&path.display().to_string(), &desc, options.show_channels),
            Err(err) => {
                failures += 1;
                log::error!("{}: {}", path.display(), err);
                eprintln!("{}: {}", path.display(), err);
            }
        }
    }

    Ok(if failures == 0 {
        ExitCode::SUCCESS
    } else {
        ExitCode::FAILURE
    })
}

fn print_descriptor(name: &str, desc: &StreamDescriptor, show_channels: bool) {
    println!("{}", name);
    println!("  container: {:?}", desc.meta);
    println!("  coding:    {} (codec 0x{:04x})", desc.coding, desc.codec_id);
    println!("  channels:  {}", desc.channel_count);
    println!("  rate:      {} Hz", desc.sample_rate);
    println!(
        "  samples:   {} ({:.3} s)",
        desc.total_samples,
        desc.length()
    );
    println!(
        "  layout:    {:?}, block 0x{:x}",
        desc.layout, desc.interleave_block_size
    );
    println!(
        "  data:      0x{:x} + 0x{:x}",
        desc.data_offset, desc.data_size
    );
    match desc.loop_window {
        Some(w) => println!(
            "  loop:      {}..{} from {:?}",
            w.start_sample, w.end_sample, w.source
        ),
        None => println!("  loop:      none"),
    }
    if let Some(decoder) = desc.external() {
        println!("  skip:      {}", decoder.skip_samples());
    }

    if show_channels {
        for (i, ch) in desc.channels.iter().enumerate() {
            let coefs = match &ch.coefficients {
                Coefficients::None => "none".to_string(),
                Coefficients::Dsp(c) => format!("dsp {:?}", c),
                Coefficients::Filter(f) => format!("{} filter taps", f.len()),
            };
            println!("  ch{}: offset 0x{:x}, coefficients {}", i, ch.start_offset, coefs);
        }
    }
}
