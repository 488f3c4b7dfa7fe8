use std::{fs, path::{Path, PathBuf}};
use ndarray::{s, Array2, ArrayView2};
use regex::Regex;
use walkdir::WalkDir;
use crate::error::{DatasetError, Result};
#[inline(always)]
fn reflect_index(pos: isize, len: usize) -> usize {
    let period = 2 * (len as isize - 1);
    let m = pos.rem_euclid(period);
    (if m < len as isize { m } else { period - m }) as usize
}
/// `numpy.pad(signal, (pad_left, pad_right), mode="reflect")`.
pub fn reflect_pad_1d(signal: &[f64], pad_left: usize, pad_right: usize) -> Vec<f64> {
    let len = signal.len();
    match len {
        0 => vec![0.0; pad_left + pad_right],
        1 => vec![signal[0]; pad_left + 1 + pad_right],
        _ => (-(pad_left as isize)..(len + pad_right) as isize)
            .map(|pos| signal[reflect_index(pos, len)])
            .collect(),
    }
}
/// Zero-pads along the time (column) axis.
pub fn pad_time(arr: ArrayView2<f32>, pre: usize, post: usize) -> Array2<f32> {
    let (n_rows, n_cols) = arr.dim();
    if pre == 0 && post == 0 {
        return arr.to_owned();
    }
    let mut padded = Array2::zeros((n_rows, pre + n_cols + post));
    padded.slice_mut(s![.., pre..pre + n_cols]).assign(&arr);
    padded
}
fn glob_regex(pattern: &str) -> Result<Regex> {
    let body: String = pattern
        .chars()
        .map(|c| match c {
            '*' => "[^/]*".to_string(),
            '?' => "[^/]".to_string(),
            c => regex::escape(&c.to_string()),
        })
        .collect();
    Regex::new(&format!("^{}$", body))
        .map_err(|e| DatasetError::Config(format!("Invalid pattern '{}': {}", pattern, e)))
}
fn has_wildcard(component: &str) -> bool {
    component.contains(['*', '?'])
}
/// Files matching a pattern with `*`/`?` wildcards in any path component,
/// e.g. `data/*/input/*.npz`. Sorted by path.
pub fn find_files(pattern: &str) -> Result<Vec<PathBuf>> {
    let mut root = PathBuf::new();
    let mut matchers = Vec::new();
    for component in Path::new(pattern).components() {
        let text = component
            .as_os_str()
            .to_str()
            .ok_or_else(|| DatasetError::Config(format!("Invalid pattern '{}'", pattern)))?;
        if matchers.is_empty() && !has_wildcard(text) {
            root.push(component);
        } else {
            matchers.push(glob_regex(text)?);
        }
    }
    if matchers.is_empty() {
        return Ok(if root.is_file() { vec![root] } else { Vec::new() });
    }
    let relative = root.as_os_str().is_empty();
    let walk_root = if relative { PathBuf::from(".") } else { root };
    fs::metadata(&walk_root).map_err(|source| DatasetError::Open { path: walk_root.clone(), source })?;
    let mut files = Vec::new();
    for entry in WalkDir::new(&walk_root)
        .follow_links(true)
        .min_depth(matchers.len())
        .max_depth(matchers.len())
    {
        let entry = entry.map_err(|e| DatasetError::Io(e.into()))?;
        if !entry.file_type().is_file() {
            continue;
        }
        let Ok(rest) = entry.path().strip_prefix(&walk_root) else { continue };
        let matched = rest
            .components()
            .zip(&matchers)
            .all(|(part, re)| part.as_os_str().to_str().is_some_and(|name| re.is_match(name)));
        if matched {
            files.push(if relative { rest.to_path_buf() } else { entry.into_path() });
        }
    }
    files.sort();
    Ok(files)
}
#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::array;
    #[test]
    fn test_reflect_pad() {
        assert_eq!(
            reflect_pad_1d(&[1., 2., 3.], 2, 2),
            vec![3., 2., 1., 2., 3., 2., 1.]
        );
        assert_eq!(reflect_pad_1d(&[1., 2.], 3, 1), vec![2., 1., 2., 1., 2., 1.]);
        assert_eq!(reflect_pad_1d(&[5.], 1, 2), vec![5., 5., 5., 5.]);
        assert_eq!(reflect_pad_1d(&[], 1, 1), vec![0., 0.]);
    }
    #[test]
    fn test_pad_time() {
        let arr = array![[1.0f32, 2.0], [3.0, 4.0]];
        let padded = pad_time(arr.view(), 1, 2);
        assert_eq!(padded, array![[0., 1., 2., 0., 0.], [0., 3., 4., 0., 0.]]);
        assert_eq!(pad_time(arr.view(), 0, 0), arr);
    }
    #[test]
    fn test_find_files() {
        let dir = tempfile::tempdir().unwrap();
        for name in ["b.npz", "a.npz", "c.wav", "a.npz.tmp"] {
            fs::write(dir.path().join(name), b"").unwrap();
        }
        fs::create_dir(dir.path().join("d.npz")).unwrap();
        let pattern = format!("{}/*.npz", dir.path().display());
        let files = find_files(&pattern).unwrap();
        let names: Vec<_> = files
            .iter()
            .map(|p| p.file_name().unwrap().to_str().unwrap().to_string())
            .collect();
        assert_eq!(names, vec!["a.npz", "b.npz"]);
    }
    #[test]
    fn test_find_files_wildcard_directories() {
        let dir = tempfile::tempdir().unwrap();
        for speaker in ["spk2", "spk1", "notes"] {
            fs::create_dir(dir.path().join(speaker)).unwrap();
        }
        fs::write(dir.path().join("spk1/a.npz"), b"").unwrap();
        fs::write(dir.path().join("spk2/a.npz"), b"").unwrap();
        fs::write(dir.path().join("spk2/b.npz"), b"").unwrap();
        fs::write(dir.path().join("notes/a.txt"), b"").unwrap();
        fs::write(dir.path().join("a.npz"), b"").unwrap();
        let files = find_files(&format!("{}/*/a.npz", dir.path().display())).unwrap();
        assert_eq!(files, vec![dir.path().join("spk1/a.npz"), dir.path().join("spk2/a.npz")]);
        let files = find_files(&format!("{}/spk?/*.npz", dir.path().display())).unwrap();
        assert_eq!(files.len(), 3);
        let literal = find_files(&format!("{}/spk2/b.npz", dir.path().display())).unwrap();
        assert_eq!(literal, vec![dir.path().join("spk2/b.npz")]);
    }
    #[test]
    fn test_find_files_missing_dir() {
        assert!(matches!(
            find_files("/definitely/not/here/*.npz"),
            Err(DatasetError::Open { .. })
        ));
    }
}
