fn main() {
    if let Err(error) = glimmer::app::run() {
        eprintln!("glimmer failed to start: {error:#}");
        std::process::exit(1);
    }
}
