use clap::Parser;
use log::{info, warn};
use std::error::Error;
use std::io::{self, Read};
use std::process;
use turc::{
    analyze, BuildError, FeatureSet, HistoryRenderer, ProgramManager, Renderer, Step, Tape,
    TuringMachine, MAX_EXECUTION_STEPS,
};

#[derive(Parser)]
#[clap(author, version, about, long_about = None, arg_required_else_help = true)]
struct Cli {
    /// List the stored programs and exit
    #[clap(short, long)]
    list: bool,

    /// The stored program to run, by name or index
    #[clap(short, long)]
    program: Option<String>,

    /// The input written onto the first tape; read from stdin when piped
    input: Option<String>,

    /// Features to compile with instead of the program defaults, e.g. `multimatch,wildcard`
    #[clap(short, long, value_delimiter = ',', conflicts_with_all = ["all_features", "no_features"])]
    features: Vec<String>,

    /// Compile with every feature enabled
    #[clap(long, conflicts_with = "no_features")]
    all_features: bool,

    /// Compile with no feature enabled
    #[clap(long)]
    no_features: bool,

    /// Print each step of the execution
    #[clap(short = 'd', long)]
    debug: bool,

    /// Print the compiled transitions before running
    #[clap(short = 't', long)]
    transitions: bool,

    /// Print the recorded steps as JSON instead of the final tapes
    #[clap(long)]
    json: bool,

    /// Stop after this many steps
    #[clap(short, long, default_value_t = MAX_EXECUTION_STEPS)]
    max_steps: usize,
}

/// Prints every step and optionally records it.
struct CliRenderer {
    print: bool,
    history: Option<HistoryRenderer>,
}

impl Renderer for CliRenderer {
    fn on_step(&mut self, state: &str, tapes: &[Tape]) {
        if self.print {
            let tapes_str = tapes
                .iter()
                .map(|tape| tape.snapshot().to_string())
                .collect::<Vec<String>>()
                .join(", ");
            println!("State: {}, Tapes: [{}]", state, tapes_str);
        }
        if let Some(history) = self.history.as_mut() {
            history.on_step(state, tapes);
        }
    }

    fn on_tape_count_changed(&mut self, count: usize) {
        if let Some(history) = self.history.as_mut() {
            history.on_tape_count_changed(count);
        }
    }
}

fn list_programs() -> Result<(), BuildError> {
    for (index, name) in ProgramManager::list_program_names().iter().enumerate() {
        let info = ProgramManager::get_program_info(index)?;
        println!(
            "{:>2}  {:<20} {} (tapes: {}, features: {})",
            index, name, info.description, info.tape_count, info.default_features
        );
    }
    Ok(())
}

fn feature_set(cli: &Cli, defaults: FeatureSet) -> Result<FeatureSet, BuildError> {
    if cli.all_features {
        Ok(FeatureSet::all())
    } else if cli.no_features {
        Ok(FeatureSet::new())
    } else if !cli.features.is_empty() {
        let mut features = FeatureSet::new();
        for name in &cli.features {
            features.enable_by_name(name.trim())?;
        }
        Ok(features)
    } else {
        Ok(defaults)
    }
}

fn read_input(cli: &Cli, sample: &str) -> io::Result<String> {
    if let Some(input) = &cli.input {
        Ok(input.clone())
    } else if atty::isnt(atty::Stream::Stdin) {
        let mut buffer = String::new();
        io::stdin().read_to_string(&mut buffer)?;
        Ok(buffer.trim_end_matches(['\r', '\n']).to_string())
    } else {
        Ok(sample.to_string())
    }
}

fn run(cli: &Cli) -> Result<(), Box<dyn Error>> {
    if cli.list {
        list_programs()?;
        return Ok(());
    }

    let key = cli.program.as_deref().unwrap_or("0");
    let program = ProgramManager::get_program(key)?;
    let features = feature_set(cli, program.default_feature_set()?)?;
    info!("compiling {} with features {}", program.name, features);

    let compiled = program.compile_with(&features)?;
    if let Err(e) = analyze(&compiled) {
        warn!("{}", e);
    }
    if cli.transitions {
        print!("{}", compiled.developer_display());
        println!();
    }

    let input = read_input(cli, program.sample_input)?;
    let renderer = CliRenderer {
        print: cli.debug,
        history: cli.json.then(HistoryRenderer::new),
    };
    let mut machine = TuringMachine::with_renderer(compiled, renderer);
    machine.load(&input);

    let result = machine.run(cli.max_steps);

    if let Some(history) = &machine.renderer().history {
        println!("{}", serde_json::to_string_pretty(history.records())?);
        return Ok(());
    }

    match result {
        Step::Halt(halt) => println!("\nMachine halted: {:?}", halt),
        Step::Continue => println!("\nStopped after {} steps.", cli.max_steps),
    }
    println!("State: {}, Steps: {}", machine.state(), machine.step_count());
    println!("\nFinal tapes:");
    for tape in machine.logical_tapes() {
        println!("{}", tape.to_text());
    }
    Ok(())
}

fn main() {
    env_logger::init();
    let cli = Cli::parse();

    if let Err(e) = run(&cli) {
        eprintln!("Error: {}", e);
        process::exit(1);
    }
}
