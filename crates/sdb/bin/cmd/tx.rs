use alloy_primitives::B256;
use clap::Parser;
use eyre::{eyre, Result};
use sdb_backend::{Breakpoints, Debugger, Scope, Session};
use tokio::io::{AsyncBufReadExt, BufReader};
use yansi::Paint;

use crate::opts::{ArtifactOpts, CacheOpts, RpcOpts};

/// Step through a mined transaction.
#[derive(Clone, Debug, Parser)]
pub struct TxArgs {
    /// The hash of the transaction.
    pub tx_hash: B256,

    /// Print the local and state variables at every step.
    #[arg(long)]
    pub vars: bool,

    /// Wait for a command before every step.
    #[arg(long, short)]
    pub interactive: bool,

    /// Stop at a source line, given as `FILE:LINE`. Can be repeated.
    #[arg(long = "break", short = 'b', value_name = "FILE:LINE")]
    pub breakpoints: Vec<String>,

    /// Read every storage slot from the node instead of the trace.
    #[arg(long)]
    pub storage_nocache: bool,

    #[command(flatten)]
    pub rpc: RpcOpts,

    #[command(flatten)]
    pub cache: CacheOpts,

    #[command(flatten)]
    pub artifacts: ArtifactOpts,
}

/// A command read in interactive mode.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum Command {
    Step,
    Continue,
    Reverse,
    Vars,
    Quit,
}

impl Command {
    fn parse(input: &str) -> Option<Self> {
        match input.trim() {
            "" | "n" | "next" => Some(Self::Step),
            "c" | "continue" => Some(Self::Continue),
            "r" | "reverse" => Some(Self::Reverse),
            "v" | "vars" => Some(Self::Vars),
            "q" | "quit" => Some(Self::Quit),
            _ => None,
        }
    }
}

impl TxArgs {
    pub async fn run(self) -> Result<()> {
        let mut builder = Debugger::builder()
            .rpc_url(self.rpc.url())
            .no_cache(self.cache.no_cache)
            .storage_nocache(self.storage_nocache)
            .artifacts(self.artifacts.load()?);
        if let Some(cache_root) = self.cache.cache_root.clone() {
            builder = builder.cache_root(cache_root);
        }
        let debugger = builder.build()?;

        let mut session = debugger.debug(self.tx_hash).await?;
        session.set_breakpoints(parse_breakpoints(&self.breakpoints)?);
        info!(tx = %self.tx_hash, steps = session.steps().len(), "debugging transaction");

        if session.steps().is_empty() {
            println!("{}", "The transaction executed no known source code.".yellow());
            return Ok(());
        }

        if self.interactive {
            self.interact(&mut session).await
        } else {
            self.print_all(&mut session).await;
            Ok(())
        }
    }

    async fn print_all(&self, session: &mut Session) {
        let stop_at_breakpoints = !session.breakpoints().is_empty();
        loop {
            let end = if stop_at_breakpoints {
                session.continue_until_breakpoint()
            } else {
                session.step()
            };
            self.print_step(session).await;
            if end {
                break;
            }
        }
    }

    async fn interact(&self, session: &mut Session) -> Result<()> {
        println!("{}", "[enter] step  [c] continue  [r] reverse  [v] variables  [q] quit".dim());

        let mut lines = BufReader::new(tokio::io::stdin()).lines();
        while let Some(input) = lines.next_line().await? {
            let Some(command) = Command::parse(&input) else {
                println!("{}", format!("unknown command `{}`", input.trim()).red());
                continue;
            };

            let end = match command {
                Command::Step => session.step(),
                Command::Continue => session.continue_until_breakpoint(),
                Command::Reverse => {
                    session.reverse();
                    println!("{}", format!("now stepping {:?}", session.direction()).dim());
                    continue;
                }
                Command::Vars => {
                    print_variables(session).await;
                    continue;
                }
                Command::Quit => break,
            };
            self.print_step(session).await;
            if end {
                println!("{}", "reached the end of the steps".dim());
            }
        }
        Ok(())
    }

    async fn print_step(&self, session: &mut Session) {
        let Some(step) = session.current() else { return };
        let location = match step.line() {
            Some(line) => format!("{}:{line}", step.file_name),
            None => step.file_name.clone(),
        };
        let function = step.calls.last().map(|call| format!("{}.{}", call.contract, call.function));
        println!(
            "{} {} {} {}",
            format!("{:>6}", step.index).dim(),
            format!("{:<12}", step.kind.as_ref()).cyan(),
            location.green(),
            function.unwrap_or_default().dim()
        );
        if let Some(line) = session.get_line() {
            println!("       {}", line.trim_end());
        }
        if self.vars {
            print_variables(session).await;
        }
    }
}

async fn print_variables(session: &mut Session) {
    for (scope, title) in [(Scope::Local, "locals"), (Scope::Global, "globals")] {
        let variables = session.get_variables(scope).await;
        if variables.is_empty() {
            continue;
        }
        println!("       {}", title.bold());
        for (name, value) in variables {
            println!("         {} = {value}", name.blue());
        }
    }
}

/// Groups `FILE:LINE` arguments by file.
fn parse_breakpoints(args: &[String]) -> Result<Breakpoints> {
    let mut breakpoints = Breakpoints::new();
    for arg in args {
        let (file, line) =
            arg.rsplit_once(':').ok_or_else(|| eyre!("breakpoint `{arg}` is not FILE:LINE"))?;
        let line = line.parse::<usize>().map_err(|e| eyre!("breakpoint `{arg}`: {e}"))?;
        if file.is_empty() || line == 0 {
            return Err(eyre!("breakpoint `{arg}` is not FILE:LINE"));
        }
        let lines = breakpoints.entry(file.to_string()).or_default();
        if !lines.contains(&line) {
            lines.push(line);
        }
    }
    Ok(breakpoints)
}
