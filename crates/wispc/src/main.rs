use anyhow::{anyhow, bail, Context};
use serde::Serialize;
use std::env;
use std::process;
use wisp_host::{
    HeapTables, Session, SessionConfig, Tag, Value, WasmWisp, WispError, TOOL_NAME,
    VERSION,
};

const MODULE_ENV: &str = "WISP_WASM";

const HELP: &str = "\
wisp runtime inspector

Usage:
  wisp <command> [options]

Commands:
  eval <module> <expr>... [--steps N] [--json]
  read <module> <expr> [--json]
  dump <module> [--json]
  tags <module> [--json]

The module may be omitted when WISP_WASM names it; an explicit .wasm or .wat
path still takes precedence.

Options:
  -h, --help     Show this help message
  --version      Show version information
";

const EVAL_HELP: &str = "\
Usage:
  wisp eval <module> <expr>... [--steps N] [--json]

Options:
  --steps        Step budget for each evaluation (default: WISP_STEPS or 10000)
  --json         Emit JSON output
  -h, --help     Show this help message
";

const READ_HELP: &str = "\
Usage:
  wisp read <module> <expr> [--json]

Options:
  --json         Emit JSON output
  -h, --help     Show this help message
";

const DUMP_HELP: &str = "\
Usage:
  wisp dump <module> [--json]

Options:
  --json         Emit every heap table as JSON
  -h, --help     Show this help message
";

const TAGS_HELP: &str = "\
Usage:
  wisp tags <module> [--json]

Options:
  --json         Emit JSON output
  -h, --help     Show this help message
";

#[derive(Debug, PartialEq, Eq)]
enum Command {
    Eval {
        module: String,
        exprs: Vec<String>,
        steps: Option<u32>,
        json: bool,
    },
    Read {
        module: String,
        expr: String,
        json: bool,
    },
    Dump {
        module: String,
        json: bool,
    },
    Tags {
        module: String,
        json: bool,
    },
}

#[derive(Serialize)]
struct Diagnostic {
    code: &'static str,
    message: String,
}

#[derive(Serialize)]
struct ValueReport {
    source: String,
    raw: Value,
    tag: Option<Tag>,
    rendered: Option<String>,
}

#[derive(Serialize)]
struct EvalReport {
    tool: &'static str,
    version: &'static str,
    ok: bool,
    config: Option<SessionConfig>,
    results: Vec<ValueReport>,
    diagnostics: Vec<Diagnostic>,
}

#[derive(Serialize)]
struct TableCount {
    tag: Tag,
    rows: u32,
    columns: &'static [&'static str],
}

#[derive(Serialize)]
struct DumpReport {
    tool: &'static str,
    version: &'static str,
    ok: bool,
    block_size: usize,
    counts: Vec<TableCount>,
    tables: Option<HeapTables>,
    diagnostics: Vec<Diagnostic>,
}

#[derive(Serialize)]
struct TagEntry {
    name: &'static str,
    code: u32,
}

#[derive(Serialize)]
struct TagsReport {
    tool: &'static str,
    version: &'static str,
    ok: bool,
    tags: Vec<TagEntry>,
    sys: Vec<TagEntry>,
    diagnostics: Vec<Diagnostic>,
}

fn main() {
    env_logger::init();
    let args: Vec<String> = env::args().skip(1).collect();

    if args.is_empty() || matches!(args[0].as_str(), "-h" | "--help") {
        print!("{HELP}");
        return;
    }

    if args[0] == "--version" {
        println!("{TOOL_NAME} {VERSION}");
        return;
    }

    if contains_help_flag(&args[1..]) {
        let help = match args[0].as_str() {
            "eval" => EVAL_HELP,
            "read" => READ_HELP,
            "dump" => DUMP_HELP,
            "tags" => TAGS_HELP,
            _ => HELP,
        };
        print!("{help}");
        return;
    }

    let env_module = env::var(MODULE_ENV).ok().filter(|path| !path.is_empty());
    let command = match parse_command(&args, env_module.as_deref()) {
        Ok(command) => command,
        Err(message) => {
            eprintln!("error: {message}");
            eprintln!();
            eprintln!("{HELP}");
            process::exit(2);
        }
    };

    match execute(command) {
        Ok(true) => {}
        Ok(false) => process::exit(1),
        Err(err) => {
            eprintln!("error: {err:#}");
            process::exit(2);
        }
    }
}

fn contains_help_flag(args: &[String]) -> bool {
    args.iter().any(|arg| matches!(arg.as_str(), "-h" | "--help"))
}

fn parse_command(args: &[String], env_module: Option<&str>) -> Result<Command, String> {
    match args[0].as_str() {
        "eval" => parse_eval(&args[1..], env_module),
        "read" => parse_read(&args[1..], env_module),
        "dump" => {
            let parsed = parse_flags(&args[1..], false)?;
            let module = module_only(parsed.positionals, env_module, "dump")?;
            Ok(Command::Dump {
                module,
                json: parsed.json,
            })
        }
        "tags" => {
            let parsed = parse_flags(&args[1..], false)?;
            let module = module_only(parsed.positionals, env_module, "tags")?;
            Ok(Command::Tags {
                module,
                json: parsed.json,
            })
        }
        other => Err(format!("unknown command '{other}'")),
    }
}

fn parse_eval(args: &[String], env_module: Option<&str>) -> Result<Command, String> {
    let parsed = parse_flags(args, true)?;
    let (module, exprs) = split_module(parsed.positionals, env_module, "eval")?;
    if exprs.is_empty() {
        return Err("missing expression for eval".to_string());
    }
    Ok(Command::Eval {
        module,
        exprs,
        steps: parsed.steps,
        json: parsed.json,
    })
}

fn parse_read(args: &[String], env_module: Option<&str>) -> Result<Command, String> {
    let parsed = parse_flags(args, false)?;
    let (module, mut exprs) = split_module(parsed.positionals, env_module, "read")?;
    let expr = match exprs.len() {
        0 => return Err("missing expression for read".to_string()),
        1 => exprs.remove(0),
        _ => return Err("read takes a single expression".to_string()),
    };
    Ok(Command::Read {
        module,
        expr,
        json: parsed.json,
    })
}

struct ParsedArgs {
    positionals: Vec<String>,
    steps: Option<u32>,
    json: bool,
}

fn parse_flags(args: &[String], allow_steps: bool) -> Result<ParsedArgs, String> {
    let mut positionals = Vec::new();
    let mut steps = None;
    let mut json = false;
    let mut iter = args.iter();

    while let Some(arg) = iter.next() {
        match arg.as_str() {
            "--json" => json = true,
            "--steps" => {
                if !allow_steps {
                    return Err("unexpected --steps".to_string());
                }
                let value = iter
                    .next()
                    .ok_or_else(|| "missing value for --steps".to_string())?;
                steps = Some(parse_steps(value)?);
            }
            flag if flag.starts_with("--") => {
                return Err(format!("unknown option '{flag}'"));
            }
            value => positionals.push(value.to_string()),
        }
    }

    Ok(ParsedArgs {
        positionals,
        steps,
        json,
    })
}

fn parse_steps(value: &str) -> Result<u32, String> {
    value
        .parse()
        .map_err(|_| format!("invalid step budget '{value}' (expected a non-negative integer)"))
}

fn is_module_path(arg: &str) -> bool {
    arg.ends_with(".wasm") || arg.ends_with(".wat")
}

// The first positional names the module. With WISP_WASM set it may be left
// out, in which case a leading `.wasm`/`.wat` path still overrides it.
fn split_module(
    mut positionals: Vec<String>,
    env_module: Option<&str>,
    command: &str,
) -> Result<(String, Vec<String>), String> {
    if let Some(module) = env_module {
        if !positionals.first().is_some_and(|arg| is_module_path(arg)) {
            return Ok((module.to_string(), positionals));
        }
    }
    if positionals.is_empty() {
        return Err(format!("missing module for {command}"));
    }
    let module = positionals.remove(0);
    Ok((module, positionals))
}

fn module_only(
    positionals: Vec<String>,
    env_module: Option<&str>,
    command: &str,
) -> Result<String, String> {
    match (positionals.len(), env_module) {
        (0, Some(module)) => Ok(module.to_string()),
        (0, None) => Err(format!("missing module for {command}")),
        (1, _) => Ok(positionals.into_iter().next().unwrap_or_default()),
        _ => Err("multiple modules provided".to_string()),
    }
}

fn open_session(module: &str, config: SessionConfig) -> anyhow::Result<Session<WasmWisp>> {
    let runtime = WasmWisp::from_file(module).with_context(|| format!("loading '{module}'"))?;
    let mut session = Session::with_config(runtime, config)?;
    session.attach()?;
    Ok(session)
}

fn execute(command: Command) -> anyhow::Result<bool> {
    match command {
        Command::Eval {
            module,
            exprs,
            steps,
            json,
        } => {
            let mut config = SessionConfig::from_env();
            if let Some(steps) = steps {
                config.step_budget = steps;
            }
            let mut session = open_session(&module, config)?;
            let mut report = EvalReport {
                tool: TOOL_NAME,
                version: VERSION,
                ok: true,
                config: Some(config),
                results: Vec::new(),
                diagnostics: Vec::new(),
            };
            for expr in exprs {
                let outcome = session
                    .read_text(&expr)
                    .and_then(|value| session.eval_default(value))
                    .and_then(|result| describe(&mut session, &expr, result));
                record(&mut report.results, &mut report.diagnostics, outcome, json)?;
            }
            report.ok = report.diagnostics.is_empty();
            finish(&report, report.ok, json)
        }
        Command::Read { module, expr, json } => {
            let mut session = open_session(&module, SessionConfig::default())?;
            let mut report = EvalReport {
                tool: TOOL_NAME,
                version: VERSION,
                ok: true,
                config: None,
                results: Vec::new(),
                diagnostics: Vec::new(),
            };
            let outcome = session
                .read_text(&expr)
                .and_then(|value| describe(&mut session, &expr, value));
            record(&mut report.results, &mut report.diagnostics, outcome, json)?;
            report.ok = report.diagnostics.is_empty();
            finish(&report, report.ok, json)
        }
        Command::Dump { module, json } => {
            let mut session = open_session(&module, SessionConfig::default())?;
            let tables = session.snapshot()?;
            let counts = HeapTables::SCHEMA
                .iter()
                .map(|(tag, columns)| TableCount {
                    tag: *tag,
                    rows: tables.row_count(*tag).unwrap_or_default(),
                    columns: *columns,
                })
                .collect::<Vec<_>>();
            if json {
                let report = DumpReport {
                    tool: TOOL_NAME,
                    version: VERSION,
                    ok: true,
                    block_size: HeapTables::block_size(),
                    counts,
                    tables: Some(tables),
                    diagnostics: Vec::new(),
                };
                return finish(&report, true, true);
            }
            for count in &counts {
                println!(
                    "{:<4} {:>6} rows  ({})",
                    count.tag.name(),
                    count.rows,
                    count.columns.join(" ")
                );
            }
            println!("total {} rows", tables.total_rows());
            Ok(true)
        }
        Command::Tags { module, json } => {
            let session = open_session(&module, SessionConfig::default())?;
            let codes = session.codes();
            let tags = codes
                .tag_entries()
                .into_iter()
                .map(|(tag, code)| TagEntry {
                    name: tag.name(),
                    code: u32::from(code),
                })
                .collect::<Vec<_>>();
            let sys = codes
                .sys_entries()
                .into_iter()
                .map(|(sys, value)| TagEntry {
                    name: sys.name(),
                    code: value.raw(),
                })
                .collect::<Vec<_>>();
            if json {
                let report = TagsReport {
                    tool: TOOL_NAME,
                    version: VERSION,
                    ok: true,
                    tags,
                    sys,
                    diagnostics: Vec::new(),
                };
                return finish(&report, true, true);
            }
            for entry in &tags {
                println!("{:<4} {:#04x}", entry.name, entry.code);
            }
            for entry in &sys {
                println!("{:<4} {:#010x}", entry.name, entry.code);
            }
            Ok(true)
        }
    }
}

fn describe(
    session: &mut Session<WasmWisp>,
    source: &str,
    value: Value,
) -> Result<ValueReport, WispError> {
    let inspector = session.inspect()?;
    let tag = inspector.tag_of(value).ok();
    let rendered = match inspector.render(value) {
        Ok(text) => Some(text),
        Err(err) => {
            log::warn!("cannot render {value}: {err}");
            None
        }
    };
    Ok(ValueReport {
        source: source.to_string(),
        raw: value,
        tag,
        rendered,
    })
}

// Text mode stops at the first failure; JSON mode collects it as a diagnostic.
fn record(
    results: &mut Vec<ValueReport>,
    diagnostics: &mut Vec<Diagnostic>,
    outcome: Result<ValueReport, WispError>,
    json: bool,
) -> anyhow::Result<()> {
    match outcome {
        Ok(report) => {
            if !json {
                match &report.rendered {
                    Some(text) => println!("{text}"),
                    None => println!("{}", report.raw),
                }
            }
            results.push(report);
            Ok(())
        }
        Err(err) if json => {
            diagnostics.push(Diagnostic {
                code: err.code(),
                message: err.to_string(),
            });
            Ok(())
        }
        Err(err) => Err(anyhow!("[{}] {err}", err.code())),
    }
}

fn finish<T: Serialize>(report: &T, ok: bool, json: bool) -> anyhow::Result<bool> {
    if json {
        let text = serde_json::to_string_pretty(report)?;
        println!("{text}");
    } else if !ok {
        bail!("evaluation failed");
    }
    Ok(ok)
}
