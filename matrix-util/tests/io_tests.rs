use matrix_util::common_io::{create_temp_dir_file, write_lines};
use matrix_util::build_data;

#[test]
fn dense_gz_io_test() -> anyhow::Result<()> {
    let (_dir, data_file) = create_temp_dir_file(".txt.gz")?;
    let data_file = data_file.to_str().ok_or(anyhow::anyhow!("path"))?;

    write_lines(&["2 3", "1 2 3", "4 5 6"], data_file)?;

    let data = build_data("dense", data_file)?;
    assert_eq!(data.n_examples(), 3);
    assert_eq!(data.n_dim_y(), 2);
    assert_eq!(data.slice_data(&[1])?, ndarray::array![[2.0], [5.0]]);
    assert_eq!(
        data.slice_data(&[2, 0])?,
        ndarray::array![[3.0, 1.0], [6.0, 4.0]]
    );
    assert!(data.train_filter().is_none());

    let tdata = data.transpose();
    assert_eq!(tdata.n_examples(), 2);
    assert_eq!(tdata.slice_data(&[1])?, ndarray::array![[4.0], [5.0], [6.0]]);

    Ok(())
}
