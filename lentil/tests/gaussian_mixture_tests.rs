use approx::assert_abs_diff_eq;
use lentil::gaussian_mixture::{PGaussianMixture, QGaussianMixture};
use lentil::inference::{minibatch_elbo, run};
use lentil::{Config, Variational};
use matrix_param::{LinkFunction, OptimizerConfig};
use matrix_util::common_io::{read_lines, write_lines};
use matrix_util::{BatchOrder, DenseData, MinibatchSampler};
use ndarray::prelude::*;
use rand::rngs::StdRng;
use rand::SeedableRng;

fn two_clusters() -> Array2<f64> {
    array![[-2.0, -2.1, -1.9, 2.0, 2.1, 1.9]]
}

fn mixture_pair() -> anyhow::Result<(PGaussianMixture, QGaussianMixture)> {
    let opt = OptimizerConfig::default();
    let link = LinkFunction::SoftPlus;
    let p = PGaussianMixture::new(2, 1, 1.0, 3.0, 1.0);
    let q = QGaussianMixture::new(
        lentil::dirichlet::QDirichlet::new(2, 1.0, link, opt)?,
        vec![
            lentil::normal::QNormal::new(1, -1.0, 0.5, link, opt)?,
            lentil::normal::QNormal::new(1, 1.0, 0.5, link, opt)?,
        ],
    )?;
    Ok((p, q))
}

#[test]
fn minibatches_partition_the_full_elbo() -> anyhow::Result<()> {
    let data = DenseData::new(two_clusters());
    let (p, q) = mixture_pair()?;
    let mut rng = StdRng::seed_from_u64(11);
    let z = q.sample(&mut rng)?;

    let all: Vec<usize> = (0..6).collect();
    let full = minibatch_elbo(&p, &q, &data, &all, &z)?;

    let rescaled = all
        .chunks(2)
        .map(|ids| Ok(3.0 * minibatch_elbo(&p, &q, &data, ids, &z)?))
        .sum::<anyhow::Result<f64>>()?
        / 3.0;

    assert_abs_diff_eq!(rescaled, full, epsilon = 1e-9);
    Ok(())
}

#[test]
fn random_minibatches_average_to_the_full_elbo() -> anyhow::Result<()> {
    let data = DenseData::new(two_clusters());
    let (p, q) = mixture_pair()?;
    let mut rng = StdRng::seed_from_u64(5);
    let z = q.sample(&mut rng)?;

    let all: Vec<usize> = (0..6).collect();
    let full = minibatch_elbo(&p, &q, &data, &all, &z)?;

    let batch_size = 2;
    let mut sampler = MinibatchSampler::new(BatchOrder::Random, batch_size, 6, 17);
    let n = 20_000;
    let estimates = (0..n)
        .map(|_| {
            let ids = sampler.next_batch();
            Ok(3.0 * minibatch_elbo(&p, &q, &data, &ids, &z)?)
        })
        .collect::<anyhow::Result<Vec<f64>>>()?;
    let estimates = Array1::from(estimates);

    let mean = estimates.mean().unwrap_or(f64::NAN);
    let se = estimates.std(1.0) / (n as f64).sqrt();
    assert!(
        (mean - full).abs() < 5.0 * se + 1e-9,
        "mean {} full {} se {}",
        mean,
        full,
        se
    );
    Ok(())
}

#[test]
fn training_on_a_data_file() -> anyhow::Result<()> {
    let dir = tempfile::tempdir()?;
    let data_file = dir.path().join("data.txt");
    let data_file = data_file.to_str().ok_or(anyhow::anyhow!("path"))?;
    write_lines(&["1 6", "-2 -2.1 -1.9", "2 2.1 1.9"], data_file)?;

    let tsv_file = dir.path().join("params.tsv.gz");
    let tsv_file = tsv_file.to_str().ok_or(anyhow::anyhow!("path"))?;

    let config = Config::from_toml_str(&format!(
        r#"
        seed = 1
        samples = 5
        batch_size = 3
        batch_order = "random"
        n_iterations = 10
        print_every = 5
        n_threads = 2
        observations = true
        data_file = "{}"
        data_dimension = 1
        param_tsv = "{}"

        [p]
        n_components = 2
        init_scale = 3.0
        likelihood_scale = 1.0

        [q]
        init_scale = 0.5
        "#,
        data_file, tsv_file
    ))?;

    let p = PGaussianMixture::from_config(&config);
    let q = QGaussianMixture::from_config(&config)?;
    let (q, trace) = run(&config, p, q)?;

    assert_eq!(trace.len(), 10);
    assert!(trace.iter().all(|s| s.mean().is_finite() && s.sd().is_finite()));
    assert_eq!(q.components().len(), 3);

    let summary = q.summary();
    assert!(summary.contains("mixture_weight:"));
    assert!(summary.contains("component_loc_1:"));

    // 2 locations and 2 scales of dimension 1, then 2 weights
    let lines = read_lines(tsv_file)?;
    assert_eq!(&*lines[0], "name\trow\tcolumn\tvalue");
    assert_eq!(lines.len(), 1 + 6);
    assert!(lines[1].starts_with("q/component_loc_0/loc\t0\t0\t"));
    Ok(())
}

#[test]
fn data_dimension_must_match() -> anyhow::Result<()> {
    let dir = tempfile::tempdir()?;
    let data_file = dir.path().join("data.txt");
    let data_file = data_file.to_str().ok_or(anyhow::anyhow!("path"))?;
    write_lines(&["1 2", "0 1"], data_file)?;

    let config = Config::from_toml_str(&format!(
        "observations = true\ndata_file = \"{}\"\ndata_dimension = 2\n",
        data_file
    ))?;
    assert!(config.load_data().is_err());
    Ok(())
}
