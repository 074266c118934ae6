use std::process;

fn main() {
    if let Err(err) = roadref::app::run() {
        eprintln!("fatal: {err}");
        process::exit(1);
    }
}
