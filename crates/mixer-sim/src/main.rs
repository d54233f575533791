mod infra;
#[cfg(feature = "opcua")]
mod integrations;
mod runtime;

fn main() {
    if let Err(err) = runtime::run_from_args() {
        eprintln!("mixer-sim: {err}");
        std::process::exit(1);
    }
}
