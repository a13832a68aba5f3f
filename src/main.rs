use structopt::StructOpt;
use ucisc::frontend::command;

fn main() {
    env_logger::init();
    command::terminal_init();
    command::root(command::CommandRoot::from_args());
}
