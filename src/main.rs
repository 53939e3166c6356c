fn main() {
    if let Err(e) = winlapse_lib::run() {
        eprintln!("winlapse: {}", e);
        std::process::exit(1);
    }
}
