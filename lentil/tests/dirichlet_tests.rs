use approx::{assert_abs_diff_eq, assert_relative_eq};
use lentil::dirichlet::{PDirichlet, QDirichlet};
use lentil::inference::{run, PARAM_PREFIX};
use lentil::Config;
use matrix_param::io::read_records;
use matrix_param::LinkFunction;

fn dirichlet_config(extra: &str) -> anyhow::Result<Config> {
    let text = format!(
        r#"
        seed = 3
        samples = 8
        n_threads = 2
        {}

        [p]
        n_components = 3
        init_alpha = 1.0

        [q]
        link_function = "softplus"
        init_alpha = 1.0
        "#,
        extra
    );
    Config::from_toml_str(&text)
}

fn fit(config: &Config) -> anyhow::Result<QDirichlet> {
    let (q, _) = run(
        config,
        PDirichlet::from_config(config),
        QDirichlet::from_config(config)?,
    )?;
    Ok(q)
}

#[test]
fn zero_iterations_keep_the_initial_alpha() -> anyhow::Result<()> {
    let config = dirichlet_config("n_iterations = 0")?;
    let q = fit(&config)?;

    let w0 = LinkFunction::SoftPlus.f_inv(1.0)?;
    let expected = (1.0 + w0.exp()).ln();
    assert_eq!(q.alpha().len(), 3);
    for &a in q.alpha().iter() {
        assert_abs_diff_eq!(a, expected, epsilon = 1e-12);
    }
    Ok(())
}

#[test]
fn same_seed_same_result() -> anyhow::Result<()> {
    let config = dirichlet_config("n_iterations = 20")?;
    let first = fit(&config)?.alpha();
    let second = fit(&config)?.alpha();
    assert_eq!(first, second);
    assert!(first.iter().all(|a| a.is_finite() && *a > 0.0));

    let mut other = config.clone();
    other.seed = 4;
    assert_ne!(fit(&other)?.alpha(), first);
    Ok(())
}

#[test]
fn saved_parameters_reload() -> anyhow::Result<()> {
    let dir = tempfile::tempdir()?;
    let param_file = dir.path().join("q.json.gz");
    let param_file = param_file.to_str().ok_or(anyhow::anyhow!("path"))?;

    let mut config = dirichlet_config("n_iterations = 5")?;
    config.param_out = Some(param_file.to_string());
    let trained = fit(&config)?;

    let records = read_records(param_file)?;
    assert_eq!(records.len(), 1);
    assert_eq!(records[0].name, format!("{}/alpha", PARAM_PREFIX));
    assert_eq!(records[0].values.len(), 3);

    let mut config = dirichlet_config("n_iterations = 0")?;
    config.param_in = Some(param_file.to_string());
    let restored = fit(&config)?;

    assert_relative_eq!(restored.alpha(), trained.alpha(), max_relative = 1e-10);
    assert_eq!(restored.registry().n_params(), 1);
    assert_eq!(restored.registry().n_optimizers(), 1);
    Ok(())
}

#[test]
fn executable_reports_without_rust_log() -> anyhow::Result<()> {
    let dir = tempfile::tempdir()?;
    let config_file = dir.path().join("options.toml");
    std::fs::write(
        &config_file,
        "n_iterations = 12\nprint_every = 5\nsamples = 4\nn_threads = 1\n",
    )?;

    let out = std::process::Command::new(env!("CARGO_BIN_EXE_lentil-dirichlet"))
        .arg(&config_file)
        .env_remove("RUST_LOG")
        .output()?;
    assert!(out.status.success());

    let stderr = String::from_utf8_lossy(&out.stderr);
    let reported: Vec<&str> = stderr
        .lines()
        .filter_map(|l| l.split("Iteration ").nth(1))
        .filter_map(|l| l.split(',').next())
        .collect();
    assert_eq!(reported, vec!["1", "6", "11"]);

    let stdout = String::from_utf8_lossy(&out.stdout);
    assert!(stdout.starts_with("After training, alpha:"));
    Ok(())
}
