use clap::Parser;
use lentil::dirichlet::{PDirichlet, QDirichlet};
use lentil::inference::run;
use lentil::Config;
use log::info;

#[derive(Parser, Debug)]
#[command(
    version,
    about = "Fit a Dirichlet posterior by black-box variational inference",
    long_about = "Fit a Dirichlet variational posterior to a symmetric Dirichlet prior.\n\
		  All settings are read from a TOML configuration file \n\
		  (see `p.n_components`, `p.init_alpha`, `q.link_function`)."
)]
struct Cli {
    /// configuration file
    #[arg(default_value = "options.toml")]
    config: String,
}

fn main() -> anyhow::Result<()> {
    // periodic reports are info records
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();
    let cli = Cli::parse();

    let config = Config::from_file(&cli.config)?;
    let p = PDirichlet::from_config(&config);
    let q = QDirichlet::from_config(&config)?;

    let (q, trace) = run(&config, p, q)?;

    if let Some(last) = trace.last() {
        info!("final ELBO {:.3e}, std {:.3e}", last.mean(), last.sd());
    }
    println!("After training, alpha: \n{}", q.alpha());

    info!("Done");
    Ok(())
}
