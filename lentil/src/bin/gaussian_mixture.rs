use clap::Parser;
use lentil::gaussian_mixture::{PGaussianMixture, QGaussianMixture};
use lentil::inference::run;
use lentil::{Config, Variational};
use log::info;

#[derive(Parser, Debug)]
#[command(
    version,
    about = "Fit a Gaussian mixture by black-box variational inference",
    long_about = "Fit mixture weights and component locations of a Gaussian mixture\n\
		  to the dense data named by `data_file` in a TOML configuration file.\n\
		  The data file holds `rows columns` followed by the values in row-major order,\n\
		  one example per column."
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
    let p = PGaussianMixture::from_config(&config);
    let q = QGaussianMixture::from_config(&config)?;

    let (q, trace) = run(&config, p, q)?;

    if let Some(last) = trace.last() {
        info!("final ELBO {:.3e}, std {:.3e}", last.mean(), last.sd());
    }
    println!("{}", q.summary());

    info!("Done");
    Ok(())
}
