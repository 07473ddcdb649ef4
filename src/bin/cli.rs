use clap::{Parser, ValueEnum};
use colored::Colorize;
use graph_eval::sampler::SampleRequest;
use graph_eval::{compile, GraphRequest, GraphResponse, RequestError, Sampler};
use simplelog::{ColorChoice, CombinedLogger, Config, LevelFilter, TermLogger, TerminalMode};
use std::io::Read;
use std::process;

#[derive(Parser)]
#[command(name = "graph-eval")]
#[command(about = "Sample a function of x for plotting")]
#[command(version)]
struct Args {
    /// Expression in x, e.g. "sin(x) * x^2"
    #[arg(required_unless_present = "request")]
    expression: Option<String>,

    /// Left end of the range
    #[arg(long, default_value_t = -10.0, allow_negative_numbers = true)]
    min_x: f64,

    /// Right end of the range
    #[arg(long, default_value_t = 10.0, allow_negative_numbers = true)]
    max_x: f64,

    /// Requested number of points (raised to the adaptive minimum, capped at 2000)
    #[arg(long, default_value_t = 100, allow_negative_numbers = true)]
    points: i64,

    /// Read a JSON graph request from FILE, or from stdin with "-"
    #[arg(long, value_name = "FILE|-", conflicts_with = "expression")]
    request: Option<String>,

    /// Print the JSON response instead of a table
    #[arg(long)]
    json: bool,

    /// Evaluate samples on all cores
    #[arg(long)]
    parallel: bool,

    /// Print the parsed tree and the stack program before sampling
    #[arg(long)]
    dump: bool,

    #[arg(long, value_enum, default_value_t = LogLevel::Warn)]
    log_level: LogLevel,
}

#[derive(Clone, Copy, ValueEnum)]
enum LogLevel {
    Error,
    Warn,
    Info,
    Debug,
}

impl From<LogLevel> for LevelFilter {
    fn from(level: LogLevel) -> Self {
        match level {
            LogLevel::Error => LevelFilter::Error,
            LogLevel::Warn => LevelFilter::Warn,
            LogLevel::Info => LevelFilter::Info,
            LogLevel::Debug => LevelFilter::Debug,
        }
    }
}

fn main() {
    let args = Args::parse();

    // logging is best effort
    let _ = CombinedLogger::init(vec![TermLogger::new(
        args.log_level.into(),
        Config::default(),
        TerminalMode::Stderr,
        ColorChoice::Auto,
    )]);

    let request = match load_request(&args) {
        Ok(request) => request,
        Err(CliError::Io(e)) => {
            eprintln!("{} {}", "Error:".red(), e);
            process::exit(2);
        }
        Err(CliError::Request(e)) => fail(&args, &e),
    };

    let sample_request = match request.to_sample_request() {
        Ok(sample_request) => sample_request,
        Err(e) => fail(&args, &e),
    };

    let response = match run(&args, &sample_request) {
        Ok(response) => response,
        Err(e) => fail(&args, &e),
    };

    if args.json {
        print_json(&response);
    } else {
        for point in &response.points {
            println!("{}\t{}", point.x, point.y);
        }
    }

    if !response.success {
        if let Some(error) = &response.error {
            eprintln!("{} {}", "Error:".red(), error);
        }
        process::exit(1);
    }
}

enum CliError {
    Io(std::io::Error),
    Request(RequestError),
}

fn load_request(args: &Args) -> Result<GraphRequest, CliError> {
    let Some(path) = &args.request else {
        return Ok(GraphRequest {
            function: args.expression.clone().unwrap_or_default(),
            min_x: args.min_x,
            max_x: args.max_x,
            points: args.points,
        });
    };

    let body = if path == "-" {
        let mut body = String::new();
        std::io::stdin()
            .read_to_string(&mut body)
            .map_err(CliError::Io)?;
        body
    } else {
        std::fs::read_to_string(path).map_err(CliError::Io)?
    };

    GraphRequest::from_json(&body).map_err(CliError::Request)
}

fn run(args: &Args, request: &SampleRequest) -> Result<GraphResponse, RequestError> {
    let expr = compile(&request.expression)?;

    if args.dump {
        println!("{}: {}", "Tree".cyan(), expr.ast());
        println!("{}: {}", "Program".cyan(), expr.program());
    }

    let sampler = Sampler::default();
    let result = if args.parallel {
        sampler.sample_par(&expr, request.min_x, request.max_x, request.requested_points)
    } else {
        sampler.sample(&expr, request.min_x, request.max_x, request.requested_points)
    };

    Ok(result.into())
}

fn fail(args: &Args, error: &RequestError) -> ! {
    if args.json {
        print_json(&GraphResponse::failure(error));
    }
    eprintln!("{} {}", "Error:".red(), error);
    process::exit(1);
}

fn print_json(response: &GraphResponse) {
    match response.to_json() {
        Ok(json) => println!("{}", json),
        Err(e) => {
            eprintln!("{} {}", "Error:".red(), e);
            process::exit(2);
        }
    }
}
