use std::collections::BTreeMap;
use std::path::PathBuf;

use clap::{Parser, ValueEnum};
use color_eyre::eyre::eyre;
use color_eyre::Result;
use concolic_rs::context::ExecutionContext;
use concolic_rs::engine::{ExplorationEngine, ExploreConfig};
use concolic_rs::program::{ExpectedResults, Fault, FnProgram, Param, Program};
use concolic_rs::result::DisplayInputs;
use concolic_rs::sexpr;
use concolic_rs::solver::SolverKind;
use concolic_rs::symbolic::{Sym, SymInt, SymValue};
use concolic_rs::types::{Sort, Value};

#[derive(Parser)]
#[command(author, version, about = "Concolic exploration of built-in targets")]
struct Cli {
    /// Target to explore
    #[arg(value_enum)]
    target: Target,

    /// Maximum number of executions (0 = unbounded)
    #[arg(long, value_name = "INT", default_value_t = 0)]
    max_iters: usize,

    /// Maximum path length (0 = unbounded)
    #[arg(long, value_name = "INT", default_value_t = 0)]
    max_depth: usize,

    /// Solver backend: bounded or z3
    #[arg(long, value_name = "NAME", default_value_t = SolverKind::default())]
    solver: SolverKind,

    /// Only explore inputs satisfying this s-expression, e.g. "(> x 10)"
    #[arg(long, value_name = "SEXPR")]
    guard: Option<String>,

    /// Print a functional summary of the target
    #[arg(long)]
    summary: bool,

    /// Write the summary graph in DOT format
    #[arg(long, value_name = "FILE")]
    graph: Option<PathBuf>,

    /// Log level
    #[arg(long, default_value = "info")]
    log: simplelog::LevelFilter,
}

#[derive(Debug, Copy, Clone, ValueEnum)]
enum Target {
    /// Sign of an integer
    Sign,
    /// Branches on `abs(x) + y`
    AbsPlus,
    /// Quadrant of a point
    Quadrant,
    /// `x > 0 && y > 0` rewritten as `x > 0 || y > 0`
    AndorShadow,
    /// A fix that returns one more than before for large inputs
    OffByOne,
    /// Branches on the result of an opaque library call
    LibCall,
}

fn params(names: &[&str]) -> Vec<Param> {
    names.iter().map(|name| Param::symbolic(*name, Sort::Int)).collect()
}

fn target(target: Target) -> Box<dyn Program> {
    match target {
        Target::Sign => Box::new(
            FnProgram::new(params(&["x"]), |ctx, args| {
                let x = args.int("x")?;
                let r = if ctx.branch(&x.gt(0)) {
                    1
                } else if ctx.branch(&x.lt(0)) {
                    -1
                } else {
                    0
                };
                Ok(SymValue::from(r))
            })
            .with_expected(ExpectedResults::Set(vec![Value::from(-1), Value::from(0), Value::from(1)])),
        ),
        Target::AbsPlus => Box::new(FnProgram::new(params(&["x", "y"]), |ctx, args| {
            let (x, y) = (args.int("x")?, args.int("y")?);
            let ax = if ctx.branch(&x.lt(0)) { -&x } else { x };
            let s = &ax + &y;
            if ctx.branch(&s.gt(10)) {
                return Ok(SymValue::from(s));
            }
            Ok(SymValue::from(ctx.branch(&y.eq(3))))
        })),
        Target::Quadrant => Box::new(
            FnProgram::new(params(&["x", "y"]), |ctx, args| {
                let (x, y) = (args.int("x")?, args.int("y")?);
                let q = match (ctx.branch(&x.gt(0)), ctx.branch(&y.gt(0))) {
                    (true, true) => 1,
                    (false, true) => 2,
                    (false, false) => 3,
                    (true, false) => 4,
                };
                Ok(SymValue::from(q))
            })
            .with_expected(ExpectedResults::Bag((1..=4).map(Value::from).collect())),
        ),
        Target::AndorShadow => Box::new(FnProgram::new(params(&["x", "y"]), |ctx, args| {
            let (x, y) = (args.int("x")?, args.int("y")?);
            let (a, b) = (x.gt(0), y.gt(0));
            let cond = Sym::shadow(&a | &b, &a & &b);
            Ok(SymValue::from(if ctx.branch(&cond) { 1 } else { 0 }))
        })),
        Target::OffByOne => Box::new(FnProgram::new(params(&["x"]), |ctx, args| {
            let x: SymInt = args.int("x")?;
            if ctx.branch(&x.ge(10)) {
                return Ok(SymValue::from(Sym::shadow(&x + 1, x.clone())));
            }
            Ok(SymValue::from(x))
        })),
        Target::LibCall => Box::new(FnProgram::new(params(&["x"]), |ctx, args| {
            let x = args.int("x")?;
            let h = ctx.call("hash", &[SymValue::from(x)], |_, args| hash_concrete(args))?;
            match h {
                SymValue::Int(h) => Ok(SymValue::from(ctx.branch(&h.eq(22)))),
                _ => Err(Fault::Failed("hash must return an integer".to_string())),
            }
        })),
    }
}

/// The library function as it runs natively: the result carries no expression.
fn hash_concrete(args: &[SymValue]) -> std::result::Result<SymValue, Fault> {
    let x = args[0].value();
    let x = x.as_int().ok_or_else(|| Fault::Failed("hash expects an integer".to_string()))?;
    Ok(SymValue::constant(&Value::from(x * 3 + 1)))
}

/// Symbolic model of `hash`.
fn hash_symbolic(_: &mut ExecutionContext<'_>, args: &[SymValue]) -> std::result::Result<SymValue, Fault> {
    match &args[0] {
        SymValue::Int(x) => Ok(SymValue::from(x * 3 + 1)),
        other => Err(Fault::Unsupported(format!("hash of {}", other.sort()))),
    }
}

fn main() -> Result<()> {
    color_eyre::install()?;

    let cli = Cli::parse();

    simplelog::TermLogger::init(
        cli.log,
        simplelog::Config::default(),
        simplelog::TerminalMode::Mixed,
        simplelog::ColorChoice::Auto,
    )?;

    let program = target(cli.target);
    let mut config = ExploreConfig::default()
        .with_max_iterations(cli.max_iters)
        .with_max_depth(cli.max_depth)
        .with_solver(cli.solver)
        .with_summary(cli.summary)
        .with_graph(cli.graph.is_some());
    if let Some(text) = &cli.guard {
        let sorts: BTreeMap<String, Sort> = program.params().iter().map(|p| (p.name().to_string(), p.sort())).collect();
        config = config.with_guard(sexpr::parse(text, &sorts)?);
    }

    let mut engine = ExplorationEngine::new(program, config)?;
    if let Target::LibCall = cli.target {
        engine = engine.with_override("hash", hash_symbolic);
    }
    let result = engine.explore()?;

    println!("Generated inputs:");
    for (inputs, value) in result.generated_inputs.iter().zip(&result.return_values) {
        match value {
            Some(v) => println!("  {} -> {}", DisplayInputs(inputs), v),
            None => println!("  {} -> (no value)", DisplayInputs(inputs)),
        }
    }
    for cex in &result.counterexamples {
        println!(
            "Counterexample: {} (new: {}, old: {})",
            DisplayInputs(&cex.inputs),
            cex.new_value,
            cex.old_value
        );
    }
    println!("Stats: {:?}", result.stats);
    if !result.complete {
        println!("Exploration is incomplete: a limit was reached or some solver queries were undecided");
    }
    if let Some(summary) = &result.summary {
        println!("Summary: {}", summary);
    }
    if let (Some(path), Some(graph)) = (&cli.graph, &result.graph) {
        std::fs::write(path, graph)?;
        log::info!("Graph written to {:?}", path);
    }

    match result.expected_check {
        Some(false) => Err(eyre!("return values do not match the expected results")),
        _ => Ok(()),
    }
}
