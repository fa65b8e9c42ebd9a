fn main() {
    let args: Vec<String> = std::env::args().skip(1).collect();
    let operation = match bitwarden_alfred_core::runtime::parse_cli_args(&args) {
        Ok(operation) => operation,
        Err(error) => {
            let _ = error.print();
            std::process::exit(error.exit_code());
        }
    };

    if let Err(error) = bitwarden_alfred_core::runtime::run_with_options(operation) {
        eprintln!("[bitwarden-alfred] {error}");
        std::process::exit(1);
    }
}
