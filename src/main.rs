use exif_meta_link::discovery::ToolLocator;
use exif_meta_link::{
    load_config, run_batch, BatchOperation, BatchOptions, BatchSummary, ExifToolClient,
    GroupFilter, MetaConfig, MetadataSession, WriteMode, WriteOutcome, CONFIG_FILE,
};
use std::collections::BTreeMap;
use std::env;
use std::ffi::{OsStr, OsString};
use std::path::PathBuf;

fn usage() {
    println!("Read and edit image metadata through ExifTool.");
    println!();
    println!("Usage:");
    println!("  exif-meta-link [options] read <file> [--group <group>] [--search <text>]");
    println!("  exif-meta-link [options] set <file>... --tag <Group:Tag=Value>...");
    println!("  exif-meta-link [options] add <file> <Group:Tag> <value>");
    println!("  exif-meta-link [options] strip <file>...");
    println!("  exif-meta-link [options] restore <file>");
    println!("  exif-meta-link [options] copy --from <source> <file>...");
    println!();
    println!("Options:");
    println!("  --tool <path>     ExifTool executable to use");
    println!("  --config <path>   Config file (default: ./{})", CONFIG_FILE);
    println!("  --overwrite       Overwrite files without keeping a backup");
}

struct Cli {
    tool: Option<PathBuf>,
    config: PathBuf,
    overwrite: bool,
    command: String,
    rest: Vec<OsString>,
}

fn parse_cli() -> Result<Cli, String> {
    let mut tool = None;
    let mut config = PathBuf::from(CONFIG_FILE);
    let mut overwrite = false;
    let mut args = env::args_os().skip(1);

    while let Some(arg) = args.next() {
        match &*arg.to_string_lossy() {
            "--help" | "-h" => {
                usage();
                std::process::exit(0);
            }
            "--tool" => {
                let Some(path) = args.next() else {
                    return Err("Missing path after --tool".to_string());
                };
                tool = Some(PathBuf::from(path));
            }
            "--config" => {
                let Some(path) = args.next() else {
                    return Err("Missing path after --config".to_string());
                };
                config = PathBuf::from(path);
            }
            "--overwrite" => overwrite = true,
            _ => {
                return Ok(Cli {
                    tool,
                    config,
                    overwrite,
                    command: arg.to_string_lossy().to_string(),
                    rest: args.collect(),
                });
            }
        }
    }
    Err("Missing command".to_string())
}

fn take_flag_value(rest: &mut Vec<OsString>, flag: &str) -> Result<Vec<OsString>, String> {
    let mut values = Vec::new();
    while let Some(index) = rest.iter().position(|arg| arg.as_os_str() == OsStr::new(flag)) {
        if index + 1 >= rest.len() {
            return Err(format!("Missing value after {}", flag));
        }
        values.push(rest.remove(index + 1));
        rest.remove(index);
    }
    Ok(values)
}

fn text_arg(arg: OsString) -> Result<String, String> {
    arg.into_string()
        .map_err(|arg| format!("Argument is not valid UTF-8: {}", arg.to_string_lossy()))
}

fn single_file(rest: &[OsString]) -> Result<PathBuf, String> {
    match rest {
        [file] => Ok(PathBuf::from(file)),
        _ => Err("Expected exactly one file".to_string()),
    }
}

fn print_outcome(outcome: WriteOutcome) {
    match outcome {
        WriteOutcome::Unchanged => println!("No changes to write."),
        WriteOutcome::Updated { message } => println!("{}", message),
    }
}

fn print_batch(results: &[exif_meta_link::BatchResult]) -> bool {
    for result in results {
        let status = if result.success { "ok" } else { "FAILED" };
        println!("  [{}] {}: {}", status, result.path.display(), result.message);
    }
    let summary = BatchSummary::from_results(results);
    println!(
        "{} file(s): {} succeeded, {} failed",
        summary.total, summary.succeeded, summary.failed
    );
    summary.failed == 0
}

fn run(cli: Cli, config: &MetaConfig, client: &ExifToolClient) -> Result<bool, String> {
    let mut rest = cli.rest;
    let bulk_mode = if cli.overwrite {
        WriteMode::Overwrite
    } else {
        config.bulk_write_mode()
    };

    match cli.command.as_str() {
        "read" => {
            let group = take_flag_value(&mut rest, "--group")?;
            let search = take_flag_value(&mut rest, "--search")?;
            let file = single_file(&rest)?;
            let entries = client.load_metadata(&file).map_err(|e| e.to_string())?;
            let session = MetadataSession::with_entries(&file, entries);
            let filter = group
                .last()
                .map(|group| GroupFilter::parse(&group.to_string_lossy()))
                .unwrap_or_default();
            let search = match search.into_iter().last() {
                Some(search) => text_arg(search)?,
                None => String::new(),
            };
            for entry in session.filter(&search, &filter) {
                let lock = if entry.is_writable { ' ' } else { '*' };
                println!(
                    "{}{:<12} {:<14} {:<32} {}",
                    lock,
                    entry.category().label(),
                    entry.group,
                    entry.description,
                    entry.value
                );
            }
            Ok(true)
        }
        "set" => {
            let assignments = take_flag_value(&mut rest, "--tag")?;
            let mut tags = BTreeMap::new();
            for assignment in assignments {
                let assignment = text_arg(assignment)?;
                let Some((tag, value)) = assignment.split_once('=') else {
                    return Err(format!("Expected Tag=Value, got {}", assignment));
                };
                tags.insert(tag.to_string(), value.to_string());
            }
            let files: Vec<PathBuf> = rest.iter().map(PathBuf::from).collect();
            let options = BatchOptions {
                write_mode: bulk_mode,
            };
            let results = run_batch(client, &BatchOperation::SetTags(tags), &files, &options);
            Ok(print_batch(&results))
        }
        "add" => {
            let [file, tag, value] = rest.as_slice() else {
                return Err("Expected <file> <tag> <value>".to_string());
            };
            let tag = text_arg(tag.clone())?;
            let value = text_arg(value.clone())?;
            let mode = if cli.overwrite {
                WriteMode::Overwrite
            } else {
                config.add_tag_mode
            };
            let outcome = client
                .add_tag(&PathBuf::from(file), &tag, &value, mode)
                .map_err(|e| e.to_string())?;
            print_outcome(outcome);
            Ok(true)
        }
        "strip" => {
            let files: Vec<PathBuf> = rest.iter().map(PathBuf::from).collect();
            let options = BatchOptions {
                write_mode: bulk_mode,
            };
            let results = run_batch(client, &BatchOperation::StripAll, &files, &options);
            Ok(print_batch(&results))
        }
        "restore" => {
            let file = single_file(&rest)?;
            let outcome = client.restore_original(&file).map_err(|e| e.to_string())?;
            print_outcome(outcome);
            Ok(true)
        }
        "copy" => {
            let Some(source) = take_flag_value(&mut rest, "--from")?.pop() else {
                return Err("Missing --from <source>".to_string());
            };
            let files: Vec<PathBuf> = rest.iter().map(PathBuf::from).collect();
            let options = BatchOptions {
                write_mode: bulk_mode,
            };
            let operation = BatchOperation::CopyTags {
                source: PathBuf::from(source),
            };
            let results = run_batch(client, &operation, &files, &options);
            Ok(print_batch(&results))
        }
        unknown => Err(format!("Unknown command: {}", unknown)),
    }
}

fn main() {
    env_logger::init();

    let cli = match parse_cli() {
        Ok(cli) => cli,
        Err(error) => {
            eprintln!("{}", error);
            usage();
            std::process::exit(1);
        }
    };

    let config = load_config(&cli.config);
    let user_tool = cli.tool.clone().or_else(|| config.tool_path.clone());
    let tool = match ToolLocator::system().with_user_override(user_tool).resolve() {
        Ok(tool) => tool,
        Err(error) => {
            eprintln!("{}", error);
            std::process::exit(1);
        }
    };

    log::info!("ExifTool version {}", tool.version);
    let client = ExifToolClient::new(tool.path);
    match run(cli, &config, &client) {
        Ok(true) => {}
        Ok(false) => std::process::exit(2),
        Err(error) => {
            eprintln!("{}", error);
            std::process::exit(1);
        }
    }
}
