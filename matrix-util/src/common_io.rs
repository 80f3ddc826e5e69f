use flate2::read::GzDecoder;
use std::fs::File;
use std::io::{BufRead, BufReader, BufWriter, Write};
use std::path::{Path, PathBuf};

///
/// Open a file for reading, and return a buffered reader
/// * `input_file` - file name--either gzipped or not
pub fn open_buf_reader(input_file: &str) -> anyhow::Result<Box<dyn BufRead>> {
    let ext = Path::new(input_file).extension().and_then(|x| x.to_str());
    let file = File::open(input_file)
        .map_err(|e| anyhow::anyhow!("failed to open {}: {}", input_file, e))?;
    match ext {
        Some("gz") => Ok(Box::new(BufReader::new(GzDecoder::new(file)))),
        _ => Ok(Box::new(BufReader::new(file))),
    }
}

///
/// Open a file for writing, and return a buffered writer
/// * `output_file` - file name--either gzipped or not
pub fn open_buf_writer(output_file: &str) -> anyhow::Result<Box<dyn Write>> {
    // we can simply override with stdout
    if output_file.eq_ignore_ascii_case("stdout") {
        return Ok(Box::new(BufWriter::new(std::io::stdout())));
    }

    if output_file.eq_ignore_ascii_case("stderr") {
        return Ok(Box::new(BufWriter::new(std::io::stderr())));
    }

    let ext = Path::new(output_file).extension().and_then(|x| x.to_str());
    let file = File::create(output_file)?;
    match ext {
        Some("gz") => {
            let encoder = flate2::write::GzEncoder::new(file, flate2::Compression::default());
            Ok(Box::new(BufWriter::new(encoder)))
        }
        _ => Ok(Box::new(BufWriter::new(file))),
    }
}

///
/// Read every line of the input_file into memory
///
/// * `input_file` - file name--either gzipped or not
///
pub fn read_lines(input_file: &str) -> anyhow::Result<Vec<Box<str>>> {
    let buf = open_buf_reader(input_file)?;
    let mut lines = vec![];
    for x in buf.lines() {
        lines.push(x?.into_boxed_str());
    }
    Ok(lines)
}

///
/// Read every whitespace-separated word of the input_file, skipping
/// comment lines that start with `#` or `%`
///
/// * `input_file` - file name--either gzipped or not
///
pub fn read_words(input_file: &str) -> anyhow::Result<Vec<Box<str>>> {
    let lines = read_lines(input_file)?;
    Ok(lines
        .iter()
        .filter(|line| !(line.starts_with('#') || line.starts_with('%')))
        .flat_map(|line| {
            line.split_whitespace()
                .map(|w| w.to_owned().into_boxed_str())
                .collect::<Vec<_>>()
        })
        .collect())
}

///
/// Write every line into the output_file
///
/// * `lines` - vector of lines
/// * `output_file` - file name--either gzipped or not
///
pub fn write_lines<T>(lines: &[T], output_file: &str) -> anyhow::Result<()>
where
    T: std::fmt::Display,
{
    let mut buf = open_buf_writer(output_file)?;
    for line in lines {
        if let Err(e) = writeln!(buf, "{}", line) {
            if e.kind() == std::io::ErrorKind::BrokenPipe {
                return Ok(());
            }
            return Err(anyhow::anyhow!("unexpected error: {}", e));
        }
    }
    buf.flush()?;
    Ok(())
}

///
/// Create a directory if needed
/// * `file` - file name
///
pub fn mkdir(file: &str) -> anyhow::Result<()> {
    let path = Path::new(file);
    if let Some(dir) = path.parent() {
        if !dir.as_os_str().is_empty() {
            std::fs::create_dir_all(dir)?;
        }
    }
    Ok(())
}

///
/// Create a temporary directory and suggest a file name in it. The
/// directory is removed when the returned `TempDir` is dropped.
/// * `suffix` - suffix of the file name
///
pub fn create_temp_dir_file(suffix: &str) -> anyhow::Result<(tempfile::TempDir, PathBuf)> {
    let temp_dir = tempfile::tempdir()?;
    let temp_file = temp_dir.path().join(format!("tmp{}", suffix));
    Ok((temp_dir, temp_file))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn gz_lines_round_trip() -> anyhow::Result<()> {
        let (_dir, file) = create_temp_dir_file(".txt.gz")?;
        let file = file.to_str().ok_or(anyhow::anyhow!("path"))?;

        write_lines(&["# comment", "1 2", "3\t4"], file)?;
        assert_eq!(read_lines(file)?.len(), 3);

        let words = read_words(file)?;
        let words: Vec<&str> = words.iter().map(|w| w.as_ref()).collect();
        assert_eq!(words, vec!["1", "2", "3", "4"]);
        Ok(())
    }
}
