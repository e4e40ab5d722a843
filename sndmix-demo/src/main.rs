mod cli;

fn main() -> anyhow::Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let args: Vec<String> = std::env::args().skip(1).collect();
    let options = match cli::Options::parse(&args) {
        Ok(options) => options,
        Err(err) => {
            eprintln!("{}\n\n{}", err, cli::USAGE);
            std::process::exit(2);
        }
    };

    cli::run(&options)
}
