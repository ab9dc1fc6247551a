fn main() {
    if let Err(code) = intexration::cli::run() {
        std::process::exit(code.as_i32());
    }
}
