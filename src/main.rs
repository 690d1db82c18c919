fn main() {
    if let Err(err) = register_crosscheck::run() {
        eprintln!("error: {err:#}");
        std::process::exit(1);
    }
}
