//! Interactive driver for the kernel heap.
//!
//! Simulates physical RAM with a host buffer, brings up [`KernelMemory`] the
//! same way boot does, and executes allocator commands read from stdin.

mod command;
mod logger;

use command::{Command, HELP, parse_number};
use kernel_alloc::{HeapConfig, HeapLayout, KernelMemory, PhysAddr, PhysWindow};
use log::LevelFilter;
use logger::StderrLogger;
use std::io::{self, BufRead, Write};
use std::{env, process};

static LOGGER: StderrLogger = StderrLogger::new(LevelFilter::Debug);

fn main() {
    // args: [kernel_end]
    let kernel_end = env::args()
        .nth(1)
        .map_or(Some(0x0010_0000), |raw| parse_number(&raw))
        .map(PhysAddr::new);
    let Some(kernel_end) = kernel_end else {
        eprintln!("usage: heap-shell [kernel_end]");
        process::exit(2);
    };

    if let Err(e) = StderrLogger::init(&LOGGER) {
        eprintln!("logger already installed: {e}");
    }

    if let Err(e) = run(kernel_end) {
        eprintln!("heap-shell: {e}");
        process::exit(1);
    }
}

fn run(kernel_end: PhysAddr) -> Result<(), Box<dyn std::error::Error>> {
    let config = HeapConfig::default();
    let layout = HeapLayout::compute(kernel_end, &config)?;
    let mut ram = vec![0u8; layout.span()];
    let memory = KernelMemory::new(kernel_end, PhysWindow::from_slice(layout.heap_begin(), &mut ram), config)?;

    let stdin = io::stdin();
    let mut out = io::stdout().lock();
    writeln!(out, "heap ready at {}, type 'help' for commands", layout.heap_begin())?;

    for line in stdin.lock().lines() {
        let line = line?;
        let cmd = match Command::parse(&line) {
            Ok(Some(cmd)) => cmd,
            Ok(None) => continue,
            Err(e) => {
                writeln!(out, "error: {e}")?;
                continue;
            }
        };
        if cmd == Command::Quit {
            break;
        }
        execute(&memory, cmd, &mut out)?;
    }
    Ok(())
}

fn execute(memory: &KernelMemory<'_>, cmd: Command, out: &mut impl Write) -> io::Result<()> {
    match cmd {
        Command::Alloc(size) => match memory.allocate_block(size) {
            Some(ptr) => writeln!(out, "block {ptr} ({size} bytes)"),
            None => writeln!(out, "allocation of {size} bytes failed"),
        },
        Command::Free(ptr) => match memory.free_block(ptr) {
            Ok(()) => writeln!(out, "freed block {ptr}"),
            Err(e) => writeln!(out, "error: {e}"),
        },
        Command::Pages(count) => match memory.allocate_pages(count) {
            Some(ptr) => writeln!(out, "pages {ptr} ({count} pages)"),
            None => writeln!(out, "allocation of {count} pages failed"),
        },
        Command::FreePage(ptr) => match memory.free_pages(ptr) {
            Ok(()) => writeln!(out, "freed page {ptr}"),
            Err(e) => writeln!(out, "error: {e}"),
        },
        Command::Defrag => writeln!(out, "merged {} blocks", memory.defragment()),
        Command::Walk => {
            let mut result = Ok(());
            memory.walk(|b| {
                if result.is_ok() {
                    result = writeln!(out, "{} {:>9} bytes  {:?}", b.payload, b.size, b.status);
                }
            });
            result?;
            writeln!(out, "frontier {}", memory.frontier())
        }
        Command::Status => writeln!(out, "{}", memory.status()),
        Command::Help => writeln!(out, "{HELP}"),
        Command::Quit => Ok(()),
    }
}
