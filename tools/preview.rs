/// Preview: interactive chat shell for trying lexicons and scene catalogs.
///
/// Usage: preview [--data <dir>] [--config <file>] [--seed <n>] [--prefs <file>] [--speak]
///
/// Anything not starting with '/' is said to the companion (an empty line
/// is the widget opening). Commands:
///   /name <name>     set the user's name
///   /mascot <name>   rename the mascot
///   /mode chat|work  switch framing
///   /scene <name>    start a scene directly
///   /topics          list topics and their scenes
///   /state           dump the session
///   /seed <n>        restart with a new seed
///   /help            list commands
///   /quit            exit
///
/// Set RUST_LOG=companion_dialogue=debug to trace classification and slots.

use companion_dialogue::core::collab::{
    PreferenceStore, Preferences, RonFilePreferences, SpeechEvent, SpeechOutput, Utterance,
    VoiceSettings,
};
use companion_dialogue::{DialogueEngine, Mode, Reply};
use std::io::{self, BufRead, Write};

/// Prints what a speech backend would be asked to voice.
struct ConsoleSpeech;

impl SpeechOutput for ConsoleSpeech {
    fn speak(&mut self, utterance: &Utterance, on_event: &mut dyn FnMut(SpeechEvent)) {
        on_event(SpeechEvent::Started);
        println!(
            "  [voice {} rate={:.2} pitch={:.2} volume={:.2}]",
            utterance.lang, utterance.voice.rate, utterance.voice.pitch, utterance.voice.volume
        );
        on_event(SpeechEvent::Ended);
    }
}

fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "warn".into()),
        )
        .init();

    let args: Vec<String> = std::env::args().collect();
    if args.iter().any(|a| a == "--help" || a == "-h") {
        print_usage();
        return;
    }

    let mut data_dir = None;
    let mut config_file = None;
    let mut prefs_file = None;
    let mut speak = false;
    let mut seed: u64 = 42;

    let mut i = 1;
    while i < args.len() {
        match args[i].as_str() {
            "--data" if i + 1 < args.len() => {
                i += 1;
                data_dir = Some(args[i].clone());
            }
            "--config" if i + 1 < args.len() => {
                i += 1;
                config_file = Some(args[i].clone());
            }
            "--prefs" if i + 1 < args.len() => {
                i += 1;
                prefs_file = Some(args[i].clone());
            }
            "--seed" if i + 1 < args.len() => {
                i += 1;
                seed = args[i].parse().unwrap_or(42);
            }
            "--speak" => speak = true,
            _ => {
                eprintln!("Unknown argument: {}", args[i]);
                print_usage();
                std::process::exit(1);
            }
        }
        i += 1;
    }

    let build = |seed: u64| {
        let mut builder = DialogueEngine::builder().seed(seed);
        if let Some(dir) = &data_dir {
            builder = builder.data_dir(dir);
        }
        if let Some(file) = &config_file {
            builder = builder.config_file(file);
        }
        builder.build()
    };

    let mut engine = match build(seed) {
        Ok(engine) => engine,
        Err(e) => {
            eprintln!("ERROR: {e}");
            std::process::exit(1);
        }
    };

    let mut store = prefs_file.map(RonFilePreferences::new);
    let mut prefs = match &store {
        Some(store) => store.load().unwrap_or_else(|e| {
            eprintln!("WARNING: could not read preferences: {e}");
            Preferences::default()
        }),
        None => Preferences::default(),
    };
    let mut speech = speak.then_some(ConsoleSpeech);

    println!(
        "Loaded {} topics, {} scenes",
        engine.catalog().topics.len(),
        engine.catalog().scenes.len()
    );
    println!("Seed: {}", seed);
    println!("Type /help for commands. An empty line opens the chat.\n");

    let stdin = io::stdin();
    let mut stdout = io::stdout();

    loop {
        print!("you> ");
        stdout.flush().ok();

        let mut line = String::new();
        match stdin.lock().read_line(&mut line) {
            Ok(0) | Err(_) => break,
            Ok(_) => {}
        }
        let line = line.trim();

        let Some(command) = line.strip_prefix('/') else {
            let reply = engine.step(line, &prefs.to_context());
            show(&reply, speech.as_mut());
            continue;
        };

        let parts: Vec<&str> = command.split_whitespace().collect();
        let arg = parts.get(1..).map(|rest| rest.join(" ")).unwrap_or_default();
        match parts.first().copied().unwrap_or("") {
            "quit" | "exit" | "q" => {
                println!("Goodbye.");
                break;
            }
            "help" | "h" | "?" => print_help(),
            "name" => {
                prefs.user_name = arg;
                prefs = prefs.sanitized();
                println!("User name: {:?}", prefs.user_name);
                save(&mut store, &prefs);
            }
            "mascot" => {
                prefs.mascot_name = arg;
                prefs = prefs.sanitized();
                println!("Mascot name: {}", prefs.mascot_name);
                save(&mut store, &prefs);
            }
            "mode" => {
                prefs.mode = Mode::parse(&arg);
                let reply = engine.mode_notice(prefs.mode);
                show(&reply, speech.as_mut());
                save(&mut store, &prefs);
            }
            "scene" => match engine.begin_scene(&arg, &prefs.to_context()) {
                Ok(reply) => show(&reply, speech.as_mut()),
                Err(e) => println!("ERROR: {e}"),
            },
            "topics" => {
                for entry in &engine.catalog().topics {
                    let variants: Vec<&str> =
                        entry.variants.iter().map(|v| v.scene.as_str()).collect();
                    println!(
                        "  {:?} ({}) default={} variants={:?}",
                        entry.topic, entry.label, entry.default_scene, variants
                    );
                }
            }
            "state" => {
                let pretty = ron::ser::PrettyConfig::default();
                match ron::ser::to_string_pretty(engine.session(), pretty) {
                    Ok(text) => println!("{text}"),
                    Err(e) => println!("ERROR: {e}"),
                }
            }
            "seed" => match arg.parse::<u64>() {
                Ok(s) => {
                    engine.reset(s);
                    println!("Seed set to {s}; session cleared.");
                }
                Err(_) => println!("Current seed: {}", engine.seed()),
            },
            other => println!("Unknown command: /{other}. Type /help."),
        }
    }
}

fn show(reply: &Reply, speech: Option<&mut ConsoleSpeech>) {
    println!("  ({}) {}", reply.bubble, reply.mood.as_str());
    println!("bot> {}", reply.text);
    if let Some(speech) = speech {
        let utterance = Utterance::from_reply(reply, VoiceSettings::default());
        speech.speak(&utterance, &mut |_| {});
    }
}

fn save(store: &mut Option<RonFilePreferences>, prefs: &Preferences) {
    if let Some(store) = store {
        if let Err(e) = store.save(prefs) {
            eprintln!("WARNING: could not save preferences: {e}");
        }
    }
}

fn print_usage() {
    println!(
        "Usage: preview [--data <dir>] [--config <file>] [--seed <n>] [--prefs <file>] [--speak]"
    );
}

fn print_help() {
    println!("Commands:");
    println!("  /name <name>     set the user's name");
    println!("  /mascot <name>   rename the mascot");
    println!("  /mode chat|work  switch framing");
    println!("  /scene <name>    start a scene directly");
    println!("  /topics          list topics and their scenes");
    println!("  /state           dump the session");
    println!("  /seed <n>        restart with a new seed");
    println!("  /help            list commands");
    println!("  /quit            exit");
}
