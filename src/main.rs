#[global_allocator]
static GLOBAL: mimalloc::MiMalloc = mimalloc::MiMalloc;

use anyhow::Result;
use nix::sys::signal::Signal;
use relayd::{logging, Config, Relay};
use std::convert::Infallible;
use std::env;
use std::process::ExitCode;

fn main() -> ExitCode {
    let args: Vec<String> = env::args().collect();
    let prog = args.first().map(String::as_str).unwrap_or("relayd");

    match args.get(1).map(String::as_str) {
        None => {}
        Some("-h") | Some("--help") => {
            print_usage(prog);
            return ExitCode::SUCCESS;
        }
        Some("-V") | Some("--version") => {
            println!("relayd {}", env!("CARGO_PKG_VERSION"));
            return ExitCode::SUCCESS;
        }
        Some(other) => {
            eprintln!("{}: error: unknown argument '{}'", prog, other);
            print_usage(prog);
            return ExitCode::FAILURE;
        }
    }

    logging::init();

    match run() {
        Ok(never) => match never {},
        Err(e) => {
            eprintln!("{}: error: {}", prog, e);
            ExitCode::FAILURE
        }
    }
}

fn run() -> Result<Infallible> {
    let config = Config::from_env()?;
    let mut relay = Relay::start(&config, Some(Signal::SIGUSR1))?;
    Ok(relay.run()?)
}

fn print_usage(prog: &str) {
    println!("Usage: {} [-h | -V]", prog);
    println!();
    println!("Relays one IRC connection between the server, the FIFO");
    println!("$IRC_DIR/$IRC_HOST/in and the worker command $IRC_CLIENT.");
    println!();
    println!("Environment:");
    println!("  IRC_DIR       base directory (default: .)");
    println!("  IRC_HOST      server host (default: irc.freenode.org)");
    println!("  IRC_PORT      server port (default: 6667)");
    println!("  IRC_CLIENT    worker command (default: jjc)");
    println!("  IRC_NICK      nickname (default: login name)");
    println!("  IRC_USER      user name (default: nickname)");
    println!("  IRC_REALNAME  real name (default: nickname)");
    println!("  IRC_UCSPI     use descriptors 6/7 instead of connecting");
    println!("  RELAYD_LOG    log filter (default: warn)");
}
