use std::fs;
use std::path::Path;
use std::process::ExitCode;

use clap::{Args, Parser, Subcommand};
use miette::IntoDiagnostic;
use tracing_subscriber::EnvFilter;

use protmine::app::App;
use protmine::config::{Config, ConfigLoader, DEFAULT_CONFIG_FILE};
use protmine::error::MineError;
use protmine::output::{ConsoleOutput, JsonOutput};
use protmine::uniprot::UniprotHttpClient;

#[derive(Parser)]
#[command(name = "protmine")]
#[command(about = "Mines UniProtKB feature tables for identifiers embedded in gene-family files")]
#[command(version, author)]
struct Cli {
    #[arg(long, global = true)]
    json: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    #[command(about = "Mine feature tables for every matching source file")]
    Mine(MineArgs),
    #[command(about = "Write a starter protmine.json")]
    Init,
}

#[derive(Args, Clone)]
struct MineArgs {
    #[arg(long)]
    config: Option<String>,

    #[arg(long)]
    sample_dir: Option<String>,

    #[arg(long)]
    output_dir: Option<String>,

    #[arg(long)]
    job_name: Option<String>,

    #[arg(long)]
    batch_size: Option<usize>,

    #[arg(long)]
    requests_per_second: Option<f64>,

    #[arg(long)]
    mapping_table: Option<String>,

    #[arg(long)]
    file_pattern: Option<String>,

    #[arg(long)]
    id_column: Option<String>,

    #[arg(long = "field")]
    fields: Vec<String>,

    #[arg(long)]
    no_filter: bool,
}

fn main() -> ExitCode {
    if let Err(report) = run() {
        eprintln!("{report:?}");
        if let Some(mine) = report.downcast_ref::<MineError>() {
            return ExitCode::from(map_exit_code(mine));
        }
        return ExitCode::from(1);
    }
    ExitCode::SUCCESS
}

fn map_exit_code(error: &MineError) -> u8 {
    match error {
        MineError::ConfigRead(_)
        | MineError::ConfigParse(_)
        | MineError::InvalidParameter(_)
        | MineError::MissingColumn { .. } => 2,
        MineError::UniprotHttp(_) | MineError::UniprotStatus { .. } => 3,
        _ => 1,
    }
}

fn run() -> miette::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    match cli.command {
        Commands::Mine(args) => run_mine(args, cli.json),
        Commands::Init => run_init(),
    }
}

fn run_mine(args: MineArgs, json: bool) -> miette::Result<()> {
    let file_config = ConfigLoader::load(args.config.as_deref()).into_diagnostic()?;
    let overrides = Config {
        sample_dir: args.sample_dir,
        output_dir: args.output_dir,
        job_name: args.job_name,
        fields: (!args.fields.is_empty()).then_some(args.fields),
        batch_size: args.batch_size,
        requests_per_second: args.requests_per_second,
        filter_invalid_ids: args.no_filter.then_some(false),
        mapping_table: args.mapping_table,
        file_pattern: args.file_pattern,
        id_column: args.id_column,
    };
    let config = overrides.merge(file_config).resolve().into_diagnostic()?;

    let client = UniprotHttpClient::new().into_diagnostic()?;
    let app = App::new(client);

    let summary = if json {
        app.run(&config, &JsonOutput).into_diagnostic()?
    } else {
        app.run(&config, &ConsoleOutput).into_diagnostic()?
    };

    if json {
        JsonOutput::print_summary(&summary).into_diagnostic()?;
    } else {
        print_run_summary(&summary);
    }
    Ok(())
}

fn run_init() -> miette::Result<()> {
    if Path::new(DEFAULT_CONFIG_FILE).exists() {
        return Err(miette::Report::msg(format!(
            "{DEFAULT_CONFIG_FILE} already exists"
        )));
    }
    let starter = Config {
        sample_dir: Some("samples".to_string()),
        output_dir: Some("mined".to_string()),
        job_name: Some("protmine".to_string()),
        ..Config::default()
    };
    let content = serde_json::to_string_pretty(&starter).into_diagnostic()?;
    fs::write(DEFAULT_CONFIG_FILE, content + "\n").into_diagnostic()?;
    println!("wrote {DEFAULT_CONFIG_FILE}");
    Ok(())
}

fn print_run_summary(summary: &protmine::app::RunSummary) {
    let green = "\x1b[32m";
    let yellow = "\x1b[33m";
    let cyan = "\x1b[36m";
    let reset = "\x1b[0m";

    println!("{cyan}protmine summary — job {}{reset}", summary.job_name);
    for file in &summary.files {
        println!(
            "{green}✔ {} → {} ({} rows from {} identifiers){reset}",
            file.source, file.output, file.rows, file.requested
        );
        if file.filtered_out > 0 || file.unmapped > 0 {
            println!(
                "{yellow}  excluded: {} invalid-prefix, {} unmapped{reset}",
                file.filtered_out, file.unmapped
            );
        }
        if !file.dropped.is_empty() {
            println!("{yellow}  dropped {} identifier(s):{reset}", file.dropped.len());
            for dropped in &file.dropped {
                println!("{yellow}    {} — {}{reset}", dropped.id, dropped.reason);
            }
        }
    }
    println!("completed at {}", summary.completed_at);
}
