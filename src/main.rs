fn main() {
    #[cfg(feature = "cli")]
    sdat2img::cli::run();

    #[cfg(not(feature = "cli"))]
    {
        eprintln!("sdat2img: CLI not enabled. Rebuild with `--features cli`.");
        std::process::exit(1);
    }
}
