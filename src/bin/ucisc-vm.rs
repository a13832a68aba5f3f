use structopt::StructOpt;
use ucisc::frontend::command;

fn main() {
    env_logger::init();
    command::terminal_init();
    command::vm(command::SubcommandVm::from_args());
}
