fn main() {
    if let Err(err) = xcbundle::run() {
        eprintln!("Error: {:#}", err);
        std::process::exit(1);
    }
}
