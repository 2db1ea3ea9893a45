//! zenrack CLI: offline WAV render and headless realtime playback.
//!
//! Usage:
//!   zr-cli render patch.json -o out.wav --seconds 30
//!   zr-cli play patch.json --ambient rain.mp3
//!   zr-cli default-patch -o patch.json

use std::io::Write;
use std::path::{Path, PathBuf};
use std::time::{Duration, Instant};

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use zr_master::{
    export_patch, import_patch, load_ambient, render_to_wav, AmbientSource, Backend, Controller, EngineConfig, Patch,
    TicketIssuer,
};

#[derive(Parser)]
#[command(name = "zr-cli", version, about = "Ambient instrument rack")]
struct Cli {
    /// TOML file with engine settings (sample_rate, reverb_seconds, seed).
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Seed for every random choice; overrides the config file.
    #[arg(long, global = true)]
    seed: Option<u64>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Render a patch to a WAV file.
    Render {
        patch: PathBuf,
        #[arg(short, long)]
        output: PathBuf,
        #[arg(long, default_value_t = 30.0)]
        seconds: f64,
        #[arg(long)]
        sample_rate: Option<u32>,
        /// Ambient loop file or URL.
        #[arg(long)]
        ambient: Option<String>,
    },
    /// Play a patch in real time.
    Play {
        patch: PathBuf,
        /// Ambient loop file or URL.
        #[arg(long)]
        ambient: Option<String>,
        /// Stop after this many seconds instead of running until interrupted.
        #[arg(long)]
        seconds: Option<f64>,
        /// Render without an output device.
        #[arg(long)]
        null: bool,
    },
    /// Print or write the default patch.
    DefaultPatch {
        #[arg(short, long)]
        output: Option<PathBuf>,
    },
}

fn main() -> Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();
    let cli = Cli::parse();

    let mut config = load_config(cli.config.as_deref())?;
    if cli.seed.is_some() {
        config.seed = cli.seed;
    }
    log::debug!("engine config: {:?}", config);

    match cli.command {
        Command::Render { patch, output, seconds, sample_rate, ambient } => {
            if let Some(rate) = sample_rate {
                config.sample_rate = rate;
            }
            render(&patch, &output, seconds, config, ambient.as_deref())
        }
        Command::Play { patch, ambient, seconds, null } => {
            let backend = if null { Backend::Null } else { Backend::Device };
            play(&patch, ambient.as_deref(), seconds, config, backend)
        }
        Command::DefaultPatch { output } => {
            let json = export_patch(&Patch::default())?;
            match output {
                Some(path) => std::fs::write(&path, json).with_context(|| format!("writing {}", path.display())),
                None => {
                    println!("{}", json);
                    Ok(())
                }
            }
        }
    }
}

fn load_config(path: Option<&Path>) -> Result<EngineConfig> {
    let Some(path) = path else {
        return Ok(EngineConfig::default());
    };
    let text = std::fs::read_to_string(path).with_context(|| format!("reading {}", path.display()))?;
    toml::from_str(&text).with_context(|| format!("parsing {}", path.display()))
}

fn read_patch(path: &Path) -> Result<Patch> {
    let json = std::fs::read_to_string(path).with_context(|| format!("reading {}", path.display()))?;
    import_patch(&json).with_context(|| format!("importing {}", path.display()))
}

fn render(patch: &Path, output: &Path, seconds: f64, config: EngineConfig, ambient: Option<&str>) -> Result<()> {
    let patch = read_patch(patch)?;
    let clip = match ambient {
        Some(src) => {
            let ticket = TicketIssuer::new().issue();
            let clip = load_ambient(&AmbientSource::parse(src), &ticket, config.sample_rate)
                .with_context(|| format!("loading ambient {}", src))?;
            Some(clip)
        }
        None => None,
    };

    println!("Rendering {:.1}s at {} Hz to {}...", seconds, config.sample_rate, output.display());
    let wav = render_to_wav(&patch, config, seconds, clip);
    std::fs::write(output, &wav).with_context(|| format!("writing {}", output.display()))?;
    println!("Wrote {} bytes", wav.len());
    Ok(())
}

fn play(patch: &Path, ambient: Option<&str>, seconds: Option<f64>, config: EngineConfig, backend: Backend) -> Result<()> {
    let patch = read_patch(patch)?;
    let has_env = patch.env_type != zr_master::EnvType::None;
    let mut ctrl = Controller::start(patch, config, backend).context("starting audio")?;

    match ambient {
        Some(src) => ctrl.load_ambient(AmbientSource::parse(src))?,
        None if has_env => ctrl.set_ambient_playing(true)?,
        None => {}
    }
    ctrl.set_chords_playing(true)?;
    ctrl.play()?;
    println!("Playing at {} Hz. Ctrl-C to quit.", ctrl.sample_rate());

    let started = Instant::now();
    let limit = seconds.map(Duration::from_secs_f64);
    while limit.map_or(true, |l| started.elapsed() < l) {
        let pos = ctrl.position();
        print!(
            "\rStep: {:02} | Total: {:6} | BPM: {:5.1} | Voices: {:2}",
            pos.step_index,
            pos.total_steps,
            pos.bpm,
            ctrl.live_voice_count()
        );
        let _ = std::io::stdout().flush();
        std::thread::sleep(Duration::from_millis(50));
    }

    ctrl.panic()?;
    ctrl.shutdown();
    println!("\rDone.                                             ");
    Ok(())
}
