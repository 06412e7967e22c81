#![forbid(unsafe_code)]

fn main() {
    if let Err(error) = flowboard::run_from_env() {
        eprintln!("flowboard: {error}");
        std::process::exit(error.exit_code());
    }
}
