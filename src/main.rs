//! invita – command-line invitation generator.
//!
//! Usage:
//!   invita <customization.json> [output] [--format FMT] [--template ID]
//!          [--fonts DIR] [--publish]
//!
//! If `output` is omitted the artifact is written to the download-style
//! filename derived from the event title (e.g. `invitacion_nuestra-boda.png`).

use std::{env, fs, path::PathBuf, process, sync::Arc};

use invite_forge::fonts::{DirectoryFontProvider, FontCoordinator, FontProvider, HostFontProvider};
use invite_forge::publish::{PublishConfig, Publisher, SimulatedDeploy};
use invite_forge::store::{InvitationStore, MemoryStore};
use invite_forge::{Customization, OutputFormat, Pipeline, PipelineConfig, TemplateRegistry};

#[tokio::main(flavor = "current_thread")]
async fn main() {
    env_logger::init();

    let args: Vec<String> = env::args().collect();

    let mut input_path: Option<PathBuf> = None;
    let mut output_path: Option<PathBuf> = None;
    let mut format = OutputFormat::Document;
    let mut template_override: Option<String> = None;
    let mut fonts_dir: Option<PathBuf> = None;
    let mut publish = false;
    let mut positional = 0usize;

    let mut iter = args.iter().skip(1).peekable();
    while let Some(arg) = iter.next() {
        match arg.as_str() {
            "--format" | "-f" => match iter.next().and_then(|v| OutputFormat::from_arg(v)) {
                Some(f) => format = f,
                None => {
                    eprintln!("--format expects document | raster-image | printable-document");
                    process::exit(1);
                }
            },
            "--template" | "-t" => match iter.next() {
                Some(v) => template_override = Some(v.clone()),
                None => {
                    eprintln!("--template expects a template id");
                    process::exit(1);
                }
            },
            "--fonts" => match iter.next() {
                Some(v) => fonts_dir = Some(PathBuf::from(v)),
                None => {
                    eprintln!("--fonts expects a directory of .ttf files");
                    process::exit(1);
                }
            },
            "--publish" | "-p" => publish = true,
            "--help" | "-h" => {
                print_usage(&args[0]);
                process::exit(0);
            }
            other if other.starts_with('-') => {
                eprintln!("Unknown flag: {other}");
                print_usage(&args[0]);
                process::exit(1);
            }
            path => {
                if positional == 0 {
                    input_path = Some(PathBuf::from(path));
                } else if positional == 1 {
                    output_path = Some(PathBuf::from(path));
                } else {
                    eprintln!("Unexpected argument: {path}");
                    print_usage(&args[0]);
                    process::exit(1);
                }
                positional += 1;
            }
        }
    }

    let input = match input_path {
        Some(p) => p,
        None => {
            eprintln!("Error: no customization file specified.");
            print_usage(&args[0]);
            process::exit(1);
        }
    };

    let json = match fs::read_to_string(&input) {
        Ok(s) => s,
        Err(e) => {
            eprintln!("Error reading '{}': {e}", input.display());
            process::exit(1);
        }
    };
    let mut customization: Customization = match serde_json::from_str(&json) {
        Ok(c) => c,
        Err(e) => {
            eprintln!("Error parsing '{}': {e}", input.display());
            process::exit(1);
        }
    };
    if let Some(id) = template_override {
        customization.template_id = id;
    }
    if customization.template_id.is_empty() {
        eprintln!("Error: no template id (set \"template_id\" in the JSON or pass --template).");
        process::exit(1);
    }

    let config = PipelineConfig::default();
    let provider: Arc<dyn FontProvider> = match fonts_dir {
        Some(dir) => Arc::new(DirectoryFontProvider::new(dir)),
        None => Arc::new(HostFontProvider),
    };
    let coordinator = Arc::new(FontCoordinator::new(provider, config.font_fetch_timeout));
    let pipeline = Pipeline::new(TemplateRegistry::builtin(), coordinator, config);

    let invitation = match pipeline.generate(&customization, format).await {
        Ok(inv) => inv,
        Err(e) => {
            eprintln!("Error generating invitation: {e}");
            process::exit(1);
        }
    };

    let output = output_path.unwrap_or_else(|| PathBuf::from(invitation.filename()));
    if let Some(parent) = output.parent() {
        if !parent.as_os_str().is_empty() {
            if let Err(e) = fs::create_dir_all(parent) {
                eprintln!("Error creating output directory: {e}");
                process::exit(1);
            }
        }
    }
    if let Err(e) = fs::write(&output, &invitation.content) {
        eprintln!("Error writing '{}': {e}", output.display());
        process::exit(1);
    }
    eprintln!(
        "Wrote '{}' ({} bytes)",
        output.display(),
        invitation.content.len()
    );

    if let Some(thumb) = &invitation.thumbnail {
        let mut thumb_path = output.clone();
        thumb_path.set_extension("");
        let thumb_path = PathBuf::from(format!("{}_thumb.png", thumb_path.display()));
        if let Err(e) = fs::write(&thumb_path, thumb) {
            eprintln!("Error writing '{}': {e}", thumb_path.display());
            process::exit(1);
        }
        eprintln!("Wrote '{}' ({} bytes)", thumb_path.display(), thumb.len());
    }

    if publish {
        let store = Arc::new(InvitationStore::new(Arc::new(MemoryStore::new())));
        let publisher = Publisher::new(
            store,
            Arc::new(SimulatedDeploy::default()),
            PublishConfig::default(),
        );
        match publisher.publish(invitation).await {
            Ok(record) => println!("{}", record.public_url),
            Err(e) => {
                eprintln!("Error publishing: {e}");
                process::exit(1);
            }
        }
    }
}

fn print_usage(prog: &str) {
    eprintln!("invita – invitation generator (invite-forge)");
    eprintln!();
    eprintln!("Usage:");
    eprintln!("  {prog} <customization.json> [output] [--format FMT] [--template ID] [--fonts DIR] [--publish]");
    eprintln!();
    eprintln!("Arguments:");
    eprintln!("  <customization.json>  Event fields (template_id, title, names, date, ...)");
    eprintln!("  [output]              Output path (default: invitacion_<title>.<ext>)");
    eprintln!();
    eprintln!("Flags:");
    eprintln!("  --format, -f    document | raster-image | printable-document (default: document)");
    eprintln!("  --template, -t  Override the template id from the JSON");
    eprintln!("  --fonts         Directory of '<Family Name>.ttf' files to load from");
    eprintln!("  --publish, -p   Deploy to a generated subdomain and print the public URL");
    eprintln!("  --help          Print this message");
}
