use clap::{App, AppSettings, Arg, ArgMatches, SubCommand};
use quill::build::build_site;
use quill::config::Config;
use std::error::Error;
use std::path::PathBuf;
use tracing::{info, Level};

fn main() {
    let matches = App::new("quill")
        .version(env!("CARGO_PKG_VERSION"))
        .about("Builds a static blog from a headless CMS")
        .setting(AppSettings::SubcommandRequiredElseHelp)
        .arg(
            Arg::with_name("verbose")
                .short("v")
                .long("verbose")
                .global(true)
                .help("Logs every fetch and page written"),
        )
        .subcommand(
            SubCommand::with_name("build")
                .about("Fetches all articles and renders the site")
                .arg(
                    Arg::with_name("project")
                        .long("project")
                        .takes_value(true)
                        .value_name("DIR")
                        .help("Where to start looking for quill.yaml [default: .]"),
                )
                .arg(
                    Arg::with_name("output")
                        .short("o")
                        .long("output")
                        .takes_value(true)
                        .value_name("DIR")
                        .help("Where to write the site [default: <project>/_output]"),
                ),
        )
        .get_matches();

    let verbose = matches.is_present("verbose")
        || matches
            .subcommand_matches("build")
            .map_or(false, |build| build.is_present("verbose"));
    tracing_subscriber::fmt()
        .with_max_level(if verbose { Level::DEBUG } else { Level::INFO })
        .init();

    if let Err(err) = run(&matches) {
        eprintln!("error: {}", err);
        let mut source = err.source();
        while let Some(cause) = source {
            eprintln!("  caused by: {}", cause);
            source = cause.source();
        }
        std::process::exit(1);
    }
}

fn run(matches: &ArgMatches) -> Result<(), Box<dyn Error>> {
    match matches.subcommand() {
        ("build", Some(build)) => {
            let project = match build.value_of("project") {
                Some(dir) => PathBuf::from(dir),
                None => std::env::current_dir()?,
            };
            let output = match build.value_of("output") {
                Some(dir) => PathBuf::from(dir),
                None => project.join("_output"),
            };
            let config = Config::from_directory(&project, &output)?;
            let report = build_site(&config)?;
            info!(
                listing_pages = report.listing_pages,
                articles = report.articles.len(),
                output = %output.display(),
                "site built"
            );
            Ok(())
        }
        _ => Ok(()),
    }
}
