fn main() {
    if let Err(err) = ocrdesk_lib::run() {
        eprintln!("error: {err:#}");
        std::process::exit(1);
    }
}
