/// Catalog Linter: validates a lexicon/scene data directory.
///
/// Usage: catalog_linter <data_dir> [--config <file>]

use companion_dialogue::core::catalog::{CatalogError, SceneCatalog};
use companion_dialogue::core::config::EngineConfig;
use companion_dialogue::core::lexicon::{Lexicon, LexiconError};
use companion_dialogue::schema::act::AnswerKind;
use std::path::Path;
use std::process;

fn main() {
    let args: Vec<String> = std::env::args().collect();

    if args.len() < 2 || args[1] == "--help" || args[1] == "-h" {
        println!("Usage: catalog_linter <data_dir> [--config <file>]");
        process::exit(0);
    }

    let data_dir = Path::new(&args[1]);
    let mut config_path = None;

    let mut i = 2;
    while i < args.len() {
        if args[i] == "--config" && i + 1 < args.len() {
            i += 1;
            config_path = Some(args[i].clone());
        }
        i += 1;
    }

    if !data_dir.is_dir() {
        eprintln!("ERROR: Directory '{}' does not exist", data_dir.display());
        process::exit(1);
    }

    let mut errors = Vec::new();
    let mut warnings = Vec::new();

    let lexicon = match Lexicon::load_from_ron(&data_dir.join("lexicon.ron")) {
        Ok(lexicon) => {
            println!("Loaded lexicon v{}", lexicon.version);
            match lexicon.validate() {
                Ok(()) => {}
                Err(LexiconError::Invalid(problems)) => {
                    errors.extend(problems.into_iter().map(|p| format!("lexicon: {p}")))
                }
                Err(e) => errors.push(format!("lexicon: {e}")),
            }
            Some(lexicon)
        }
        Err(e) => {
            errors.push(format!("failed to load lexicon.ron: {e}"));
            None
        }
    };

    let catalog = match SceneCatalog::load_from_ron(&data_dir.join("scenes.ron")) {
        Ok(catalog) => {
            println!(
                "Loaded {} topics, {} scenes",
                catalog.topics.len(),
                catalog.scenes.len()
            );
            match catalog.validate() {
                Ok(()) => {}
                Err(CatalogError::Invalid(problems)) => {
                    errors.extend(problems.into_iter().map(|p| format!("scenes: {p}")))
                }
                Err(e) => errors.push(format!("scenes: {e}")),
            }
            warnings.extend(catalog.lint().into_iter().map(|w| format!("scenes: {w}")));
            Some(catalog)
        }
        Err(e) => {
            errors.push(format!("failed to load scenes.ron: {e}"));
            None
        }
    };

    if let (Some(lexicon), Some(catalog)) = (&lexicon, &catalog) {
        warnings.extend(cross_check(lexicon, catalog));
    }

    if let Some(path) = config_path {
        match EngineConfig::load_from_ron(Path::new(&path)) {
            Ok(_) => println!("Config OK: {path}"),
            Err(e) => errors.push(format!("config: {e}")),
        }
    }

    // Print report
    println!("\n=== Catalog Lint Report ===\n");

    if errors.is_empty() && warnings.is_empty() {
        println!("All checks passed!");
    }

    for warning in &warnings {
        println!("WARNING: {}", warning);
    }

    for error in &errors {
        println!("ERROR: {}", error);
    }

    println!(
        "\nSummary: {} errors, {} warnings",
        errors.len(),
        warnings.len()
    );

    if errors.is_empty() {
        process::exit(0);
    } else {
        process::exit(1);
    }
}

/// Findings that need both tables: choice labels the lexicon has no
/// synonyms for, and prompts that don't read as questions.
fn cross_check(lexicon: &Lexicon, catalog: &SceneCatalog) -> Vec<String> {
    let mut warnings = Vec::new();
    let mut names: Vec<&String> = catalog.scenes.keys().collect();
    names.sort();

    for name in names {
        let Some(scene) = catalog.scene(name) else {
            continue;
        };
        for step in &scene.steps {
            if step.kind == AnswerKind::Choice {
                for choice in &step.choices {
                    if !lexicon.cues.choice_synonyms.contains_key(choice) {
                        warnings.push(format!(
                            "scene '{name}' slot '{}': choice '{choice}' has no synonyms",
                            step.slot
                        ));
                    }
                }
            }
            for prompt in &step.prompts {
                if !prompt.ends_with('？') && !prompt.ends_with('?') && !prompt.ends_with('。') {
                    warnings.push(format!(
                        "scene '{name}' slot '{}': prompt '{prompt}' has no closing punctuation",
                        step.slot
                    ));
                }
            }
        }
    }

    warnings
}
