//! ldb CLI - コマンドラインインターフェース
//!
//! ランタイムの低レベルデバッガモニタ ldb のREPLインターフェース

use anyhow::Result;
use clap::{Parser, Subcommand};
use ldb_core::parse::parse_unsigned;
use ldb_core::{Arch, Control, Monitor};
use ldb_heap::{FreePointer, Space, SpaceLayout, Word};
use rustyline::error::ReadlineError;
use rustyline::DefaultEditor;
use std::path::PathBuf;
use tracing_subscriber::EnvFilter;

/// ldb - Low-level runtime debugger monitor
#[derive(Parser)]
#[command(name = "ldb")]
#[command(version = "0.1.0")]
#[command(about = "Low-level monitor for inspecting a suspended managed runtime", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: MonitorCommand,
}

#[derive(Subcommand)]
enum MonitorCommand {
    /// Attach to a running runtime process
    Attach {
        /// Process ID to attach to
        pid: i32,

        /// Static space as START:SIZE
        #[arg(long = "static", value_parser = parse_range)]
        static_space: (Word, Word),

        /// Address of the word holding the static space free pointer
        #[arg(long, value_parser = parse_word)]
        static_free: Option<Word>,

        /// Immobile space as START:SIZE (only for runtimes that have one)
        #[arg(long, value_parser = parse_range)]
        immobile: Option<(Word, Word)>,

        /// Dynamic space as START:SIZE
        #[arg(long, value_parser = parse_range)]
        dynamic: (Word, Word),

        /// Address of the word holding the dynamic space allocation pointer
        #[arg(long, value_parser = parse_word)]
        dynamic_free: Option<Word>,

        /// Register layout (x86-64 or x86, defaults to the host)
        #[arg(long, value_parser = parse_arch)]
        arch: Option<Arch>,
    },

    /// Run the monitor over a built-in synthetic runtime image
    Demo {
        /// Register layout (x86-64 or x86, defaults to the host)
        #[arg(long, value_parser = parse_arch)]
        arch: Option<Arch>,
    },
}

fn main() -> Result<()> {
    init_tracing();

    println!("ldb - Low-level runtime monitor");
    println!("Version 0.1.0");
    println!();

    let cli = Cli::parse();
    let mut monitor = init_monitor(cli.command)?;
    run_repl(&mut monitor)?;

    Ok(())
}

/// LDB_LOG でログレベルを指定する（デフォルトは warn）
fn init_tracing() {
    let filter = EnvFilter::try_from_env("LDB_LOG").unwrap_or_else(|_| EnvFilter::new("warn"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

/// 数値引数をモニタと同じ基数規則でパースする
fn parse_word(s: &str) -> std::result::Result<Word, String> {
    parse_unsigned(s).map_err(|e| format!("invalid number '{}': {}", s, e))
}

/// START:SIZE をパースする
fn parse_range(s: &str) -> std::result::Result<(Word, Word), String> {
    let (start, size) = s
        .split_once(':')
        .ok_or_else(|| format!("expected START:SIZE, got '{}'", s))?;
    Ok((parse_word(start)?, parse_word(size)?))
}

fn parse_arch(s: &str) -> std::result::Result<Arch, String> {
    Arch::by_name(s).ok_or_else(|| format!("unknown architecture '{}' (expected x86-64 or x86)", s))
}

/// ヒープ空間の構成を組み立てる
fn space(range: (Word, Word), free: Option<Word>) -> Space {
    let (start, size) = range;
    Space {
        start,
        size,
        free: match free {
            Some(cell) => FreePointer::Cell(cell),
            None => FreePointer::Fixed(start.saturating_add(size)),
        },
    }
}

/// モニタを初期化してプロセスにアタッチまたは合成イメージを作る
fn init_monitor(command: MonitorCommand) -> Result<Monitor> {
    match command {
        MonitorCommand::Attach {
            pid,
            static_space,
            static_free,
            immobile,
            dynamic,
            dynamic_free,
            arch,
        } => {
            let layout = SpaceLayout {
                static_space: space(static_space, static_free),
                immobile_space: immobile.map(|range| space(range, None)),
                dynamic_space: space(dynamic, dynamic_free),
            };

            println!("Attaching to process: {}", pid);
            let monitor = Monitor::attach(pid, layout, arch.unwrap_or_else(Arch::host))?;
            if let Some(pid) = monitor.pid() {
                println!("Attached to process {} ({} registers)", pid, monitor.arch().name);
            }
            println!();
            Ok(monitor)
        }
        MonitorCommand::Demo { arch } => {
            let monitor = Monitor::demo(arch.unwrap_or_else(Arch::host))?;
            println!("Loaded synthetic runtime image ({} registers)", monitor.arch().name);
            println!("Try: print T *FOO* $rax, dump $sp 4, regs");
            println!();
            Ok(monitor)
        }
    }
}

/// 履歴ファイルのパス
fn history_path() -> Option<PathBuf> {
    home::home_dir().map(|h| h.join(".ldb_history"))
}

/// REPLループを実行する
fn run_repl(monitor: &mut Monitor) -> Result<()> {
    println!("Type 'help' for available commands, 'quit' to exit.");
    println!();

    let mut rl = DefaultEditor::new()?;
    let history = history_path();
    if let Some(path) = &history {
        // 初回起動時はファイルがない
        let _ = rl.load_history(path);
    }

    let mut stdout = std::io::stdout();

    loop {
        let readline = rl.readline("(ldb) ");
        match readline {
            Ok(line) => {
                let line = line.trim();
                if line.is_empty() {
                    continue;
                }

                rl.add_history_entry(line)?;

                // 引数の解決に失敗したら診断を表示し、その行を捨てて次の入力へ
                match monitor.execute(line, &mut stdout) {
                    Ok(Control::Continue) => {}
                    Ok(Control::Quit) => {
                        println!("Goodbye!");
                        break;
                    }
                    Err(e) => eprintln!("{}", e),
                }
            }
            Err(ReadlineError::Interrupted) => {
                println!("CTRL-C");
                break;
            }
            Err(ReadlineError::Eof) => {
                println!("CTRL-D");
                break;
            }
            Err(err) => {
                eprintln!("Error: {:?}", err);
                break;
            }
        }
    }

    if let Some(path) = &history {
        if let Err(e) = rl.save_history(path) {
            tracing::warn!("Failed to save history to {}: {}", path.display(), e);
        }
    }

    Ok(())
}
