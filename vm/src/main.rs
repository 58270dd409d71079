use std::path::PathBuf;
use std::process::ExitCode;

use clap::Parser as ClapParser;
use heap::{Console, Heap, HeapSettings};
use vm::{Image, VM, VMSettings, VmError};

#[derive(ClapParser, Debug)]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Program image to execute
    path: PathBuf,
}

fn main() -> ExitCode {
    env_logger::init();
    let cli = Cli::parse();

    match run(&cli) {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            eprintln!("Error: {err}");
            ExitCode::FAILURE
        }
    }
}

fn run(cli: &Cli) -> Result<(), VmError> {
    let image = Image::load(&cli.path)?;
    let heap = Heap::new(HeapSettings::default(), Console::stdio());
    let mut vm = VM::new(image, heap, &VMSettings::default());
    vm.run()
}
