fn main() {
    pagelight_lib::logging::init();

    if let Err(error) = pagelight_lib::cli::run(std::env::args_os()) {
        eprintln!("{error:#}");
        std::process::exit(1);
    }
}
