//! todo-md - A markdown task list that stays editable by hand

use std::process::ExitCode;

fn main() -> ExitCode {
    if let Err(e) = todo_md::cli::run() {
        eprintln!("Error: {:#}", e);
        ExitCode::FAILURE
    } else {
        ExitCode::SUCCESS
    }
}
