//! Command-line interface for resolving first links and counting hops

use clap::{Arg, ArgAction, ArgGroup, ArgMatches, Command};
use firstlink_rust::{
    article_url, read_input_records, write_output_records, BatchRunner, CancelToken,
    FirstLinkOptions, FirstLinkResolver, HopCounter, LinkSource, TestInputRecord,
};
use serde::Serialize;
use std::fs::File;
use std::io::{self, BufReader, BufWriter};
use std::path::Path;
use std::process;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, warn};
use tracing_subscriber::EnvFilter;

#[derive(Debug, Clone, PartialEq)]
enum OutputFormat {
    Text,
    Json,
}

impl From<&str> for OutputFormat {
    fn from(s: &str) -> Self {
        match s.to_lowercase().as_str() {
            "json" => OutputFormat::Json,
            _ => OutputFormat::Text,
        }
    }
}

#[derive(Debug, Serialize)]
struct FirstLinkOutput<'a> {
    #[serde(rename = "firstLink")]
    first_link: &'a str,
}

fn cli() -> Command {
    Command::new("firstlink-rust")
        .version(env!("CARGO_PKG_VERSION"))
        .about("Follow the first links of Wikipedia articles and count the hops between them")
        .subcommand_required(true)
        .arg_required_else_help(true)
        .arg(
            Arg::new("debug")
                .short('d')
                .long("debug")
                .help("Log every fetched page and followed link")
                .action(ArgAction::SetTrue)
        )
        .arg(
            Arg::new("user-agent")
                .long("user-agent")
                .value_name("UA")
                .help("User agent sent with page requests")
                .required(false)
        )
        .arg(
            Arg::new("request-timeout")
                .long("request-timeout")
                .value_name("SECS")
                .help("Timeout for a single page request")
                .default_value("30")
                .value_parser(clap::value_parser!(u64))
        )
        .subcommand(
            Command::new("first-link")
                .about("Print the first link of an article")
                .arg(
                    Arg::new("url")
                        .short('u')
                        .long("url")
                        .value_name("URL")
                        .help("Article URL, e.g. https://en.wikipedia.org/wiki/Cheese")
                        .conflicts_with_all(["lang", "article"])
                )
                .arg(
                    Arg::new("lang")
                        .short('l')
                        .long("lang")
                        .value_name("LANG")
                        .help("Language code of the wiki")
                        .requires("article")
                )
                .arg(
                    Arg::new("article")
                        .short('a')
                        .long("article")
                        .value_name("ID")
                        .help("Article identifier, e.g. Cheese")
                        .requires("lang")
                )
                .group(ArgGroup::new("page").args(["url", "article"]).required(true))
                .arg(
                    Arg::new("format")
                        .short('f')
                        .long("format")
                        .value_name("FORMAT")
                        .help("Output format: text, json")
                        .default_value("text")
                )
        )
        .subcommand(
            Command::new("hops")
                .about("Count the first-link hops from a source to a target article")
                .arg(Arg::new("lang").short('l').long("lang").value_name("LANG").required(true))
                .arg(Arg::new("source").short('s').long("source").value_name("ID").required(true))
                .arg(Arg::new("target").short('t').long("target").value_name("ID").required(true))
                .arg(limit_arg())
        )
        .subcommand(
            Command::new("batch")
                .about("Run a JSON array of hop count tests and report their results as JSON")
                .arg(
                    Arg::new("input")
                        .short('i')
                        .long("input")
                        .value_name("FILE")
                        .help("Input JSON file (use '-' for stdin)")
                        .default_value("-")
                )
                .arg(
                    Arg::new("output")
                        .short('o')
                        .long("output")
                        .value_name("FILE")
                        .help("Output file (default: stdout)")
                        .required(false)
                )
                .arg(limit_arg())
                .arg(
                    Arg::new("concurrency")
                        .short('c')
                        .long("concurrency")
                        .value_name("N")
                        .help("Number of hop counts running at the same time")
                        .default_value("8")
                        .value_parser(clap::value_parser!(usize))
                )
                .arg(
                    Arg::new("deadline")
                        .long("deadline")
                        .value_name("SECS")
                        .help("Cancel hop counts still running after this many seconds")
                        .value_parser(clap::value_parser!(u64))
                )
        )
}

fn limit_arg() -> Arg {
    Arg::new("limit")
        .short('n')
        .long("limit")
        .value_name("HOPS")
        .help("Give up after this many hops")
        .default_value("20")
        .value_parser(clap::value_parser!(u8))
}

fn main() {
    let matches = cli().get_matches();
    init_tracing(matches.get_flag("debug"));

    if let Err(e) = run(&matches) {
        eprintln!("Error: {}", e);
        process::exit(1);
    }
}

fn init_tracing(debug: bool) {
    let filter = if debug {
        EnvFilter::new("firstlink_rust=debug,info")
    } else {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"))
    };
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(io::stderr)
        .with_target(false)
        .init();
}

fn run(matches: &ArgMatches) -> Result<(), Box<dyn std::error::Error>> {
    let mut options = options_from(matches);
    match matches.subcommand() {
        Some(("first-link", args)) => run_first_link(args, &options),
        Some(("hops", args)) => {
            options.hop_limit = limit_from(args);
            run_hops(args, &options)
        }
        Some(("batch", args)) => {
            options.hop_limit = limit_from(args);
            if let Some(concurrency) = args.get_one::<usize>("concurrency") {
                options.concurrency = *concurrency;
            }
            options.batch_deadline = args.get_one::<u64>("deadline").map(|secs| Duration::from_secs(*secs));
            run_batch(args, &options)
        }
        _ => Err("no command given".into()),
    }
}

fn options_from(matches: &ArgMatches) -> FirstLinkOptions {
    let mut options = FirstLinkOptions::default();
    if let Some(user_agent) = matches.get_one::<String>("user-agent") {
        options.user_agent = user_agent.clone();
    }
    if let Some(secs) = matches.get_one::<u64>("request-timeout") {
        options.request_timeout = Duration::from_secs(*secs);
    }
    options
}

fn limit_from(args: &ArgMatches) -> u8 {
    args.get_one::<u8>("limit").copied().unwrap_or(FirstLinkOptions::default().hop_limit)
}

fn page_url_from(args: &ArgMatches) -> Result<String, Box<dyn std::error::Error>> {
    if let Some(url) = args.get_one::<String>("url") {
        return Ok(url.clone());
    }
    match (args.get_one::<String>("lang"), args.get_one::<String>("article")) {
        (Some(lang), Some(article)) => Ok(article_url(lang, article)),
        _ => Err("either --url or --lang and --article are required".into()),
    }
}

fn run_first_link(args: &ArgMatches, options: &FirstLinkOptions) -> Result<(), Box<dyn std::error::Error>> {
    let url = page_url_from(args)?;
    let format = OutputFormat::from(args.get_one::<String>("format").map_or("text", |f| f.as_str()));
    let resolver = FirstLinkResolver::from_options(options)?;

    let first_link = resolver.resolve(&url)?;
    debug!(%url, %first_link, "resolved first link");
    match format {
        OutputFormat::Text => println!("{}", first_link),
        OutputFormat::Json => println!(
            "{}",
            serde_json::to_string_pretty(&FirstLinkOutput { first_link: &first_link })?
        ),
    }
    Ok(())
}

fn run_hops(args: &ArgMatches, options: &FirstLinkOptions) -> Result<(), Box<dyn std::error::Error>> {
    let (Some(lang), Some(source), Some(target)) = (
        args.get_one::<String>("lang"),
        args.get_one::<String>("source"),
        args.get_one::<String>("target"),
    ) else {
        return Err("--lang, --source and --target are required".into());
    };
    let resolver = FirstLinkResolver::from_options(options)?;

    let hops = HopCounter::new(&resolver, options.hop_limit).count(lang, source, target)?;
    println!("{}", hops);
    Ok(())
}

fn run_batch(args: &ArgMatches, options: &FirstLinkOptions) -> Result<(), Box<dyn std::error::Error>> {
    let records = read_records(args.get_one::<String>("input").map_or("-", |i| i.as_str()))?;

    // the blocking client has to be built and dropped outside of the runtime
    let resolver: Arc<dyn LinkSource> = Arc::new(FirstLinkResolver::from_options(options)?);
    let cancel = CancelToken::new();
    let runner = BatchRunner::new(Arc::clone(&resolver), options).with_cancel(cancel.clone());

    let runtime = tokio::runtime::Builder::new_multi_thread().enable_all().build()?;
    let output = runtime.block_on(async {
        let interrupt = tokio::spawn(async move {
            if tokio::signal::ctrl_c().await.is_ok() {
                warn!("interrupted, cancelling running hop counts");
                cancel.cancel();
            }
        });
        let output = runner.run(&records).await;
        interrupt.abort();
        output
    });
    drop(runtime);
    drop(runner);

    match args.get_one::<String>("output") {
        Some(path) => write_output_records(&output, BufWriter::new(File::create(path)?))?,
        None => write_output_records(&output, io::stdout().lock())?,
    }
    Ok(())
}

fn read_records(input: &str) -> Result<Vec<TestInputRecord>, Box<dyn std::error::Error>> {
    if input == "-" {
        return Ok(read_input_records(io::stdin().lock())?);
    }
    if !Path::new(input).exists() {
        return Err(format!("Input file '{}' does not exist", input).into());
    }
    Ok(read_input_records(BufReader::new(File::open(input)?))?)
}
