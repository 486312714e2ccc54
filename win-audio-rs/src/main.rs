use anyhow::Result;
use clap::{arg, value_parser, Command};
use std::thread;
use std::time::Duration;
use win_audio_rs::{AudioController, DeviceControl, SystemEndpoints};

fn cli() -> Command {
    let device = || {
        arg!(<DEVICE> "Endpoint to control").value_parser(["speaker", "mic"])
    };

    Command::new(env!("CARGO_BIN_NAME"))
        .about("Controls the default speaker and microphone")
        .subcommand_required(true)
        .arg_required_else_help(true)
        .subcommand(Command::new("status").about("Show volume and mute state"))
        .subcommand(
            Command::new("volume")
                .about("Get or set the volume (0-100)")
                .arg(device())
                .arg(
                    arg!([VOLUME] "Volume to set")
                        .allow_negative_numbers(true)
                        .value_parser(value_parser!(i64)),
                ),
        )
        .subcommand(Command::new("mute").arg(device()))
        .subcommand(Command::new("unmute").arg(device()))
        .subcommand(Command::new("demo").about("Walk through every operation, then restore"))
}

fn select<'a>(
    audio: &'a AudioController<SystemEndpoints>,
    matches: &clap::ArgMatches,
) -> DeviceControl<'a, SystemEndpoints> {
    match matches.get_one::<String>("DEVICE").map(String::as_str) {
        Some("mic") => audio.mic(),
        _ => audio.speaker(),
    }
}

fn print_status(audio: &AudioController<SystemEndpoints>) -> Result<()> {
    for device in [audio.speaker(), audio.mic()] {
        println!(
            "{}: {}{}",
            device.flow(),
            device.volume()?,
            if device.is_muted()? { " (muted)" } else { "" }
        );
    }
    Ok(())
}

fn demo(audio: &AudioController<SystemEndpoints>) -> Result<()> {
    let pause = || thread::sleep(Duration::from_secs(3));

    let speaker = audio.speaker();
    let mic = audio.mic();
    let initial_speaker = (speaker.volume()?, speaker.is_muted()?);
    let initial_mic = (mic.volume()?, mic.is_muted()?);
    print_status(audio)?;

    let run = || -> Result<()> {
        speaker.set_volume(75)?;
        println!("speaker set to 75, now {}", speaker.volume()?);
        pause();

        speaker.mute()?;
        println!("speaker muted: {}", speaker.is_muted()?);
        pause();

        speaker.unmute()?;
        speaker.set_volume(30)?;
        println!("speaker unmuted and set to 30, now {}", speaker.volume()?);
        pause();

        mic.set_volume(i64::from(initial_mic.0) + 10)?;
        println!("mic raised, now {}", mic.volume()?);
        pause();

        mic.mute()?;
        println!("mic muted: {}", mic.is_muted()?);
        pause();
        Ok(())
    };
    let outcome = run();
    if let Err(e) = &outcome {
        tracing::error!(error = %e, "demo step failed");
    }

    println!("restoring original values");
    for (device, (volume, muted)) in [(&speaker, initial_speaker), (&mic, initial_mic)] {
        if muted {
            device.mute()?;
        } else {
            device.unmute()?;
        }
        device.set_volume(i64::from(volume))?;
    }

    outcome
}

fn main() -> Result<()> {
    let subscriber = tracing_subscriber::fmt::Subscriber::builder()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_writer(std::io::stderr)
        .finish();
    tracing::subscriber::set_global_default(subscriber)?;

    let audio = AudioController::system();
    let matches = cli().get_matches();

    match matches.subcommand() {
        Some(("status", _)) => print_status(&audio)?,
        Some(("volume", sub_matches)) => {
            let device = select(&audio, sub_matches);
            if let Some(volume) = sub_matches.get_one::<i64>("VOLUME") {
                device.set_volume(*volume)?;
            } else {
                println!("{}", device.volume()?);
            }
        }
        Some(("mute", sub_matches)) => select(&audio, sub_matches).mute()?,
        Some(("unmute", sub_matches)) => select(&audio, sub_matches).unmute()?,
        Some(("demo", _)) => demo(&audio)?,
        _ => unreachable!(),
    }

    Ok(())
}
