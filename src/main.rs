use env_logger::Env;
use fluent_filter::cli_parse;

fn main() -> anyhow::Result<()> {
    let cli = cli_parse();

    env_logger::Builder::from_env(Env::default().default_filter_or(cli.log_level().as_str()))
        .format_timestamp(None)
        .init();

    fluent_filter::run(&cli)
}
