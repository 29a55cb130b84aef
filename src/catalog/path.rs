use crate::error::{Error, Result};

/// validate a logical path: `[a-zA-Z0-9/_-]+`, no `..`, no `//`,
/// no leading or trailing `/`
pub fn validate_path(path: &str) -> Result<()> {
    if path.is_empty() {
        return Err(Error::InvalidPath("path cannot be empty".to_string()));
    }

    if !path
        .chars()
        .all(|c| c.is_ascii_alphanumeric() || matches!(c, '/' | '_' | '-'))
    {
        return Err(Error::InvalidPath(format!(
            "path can only contain letters, numbers, '/', '_' and '-': {}",
            path
        )));
    }

    if path.contains("..") || path.contains("//") {
        return Err(Error::InvalidPath(format!(
            "invalid path structure: {}",
            path
        )));
    }

    if path.starts_with('/') || path.ends_with('/') {
        return Err(Error::InvalidPath(format!(
            "path cannot start or end with '/': {}",
            path
        )));
    }

    Ok(())
}

/// basename of an uploaded file name
pub fn file_base_name(uploaded: &str) -> Result<String> {
    let base = uploaded
        .rsplit(['/', '\\'])
        .next()
        .unwrap_or(uploaded)
        .trim();

    if base.is_empty() || base == "." || base == ".." || base.contains('\0') {
        return Err(Error::InvalidFileName(uploaded.to_string()));
    }

    Ok(base.to_string())
}

/// split `dir/sub/name.ext` into (`dir/sub`, `name.ext`)
pub fn split_file_path(file_path: &str) -> (&str, &str) {
    match file_path.rsplit_once('/') {
        Some((path, name)) => (path, name),
        None => ("", file_path),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_valid_paths() {
        assert!(validate_path("documents").is_ok());
        assert!(validate_path("documents/test").is_ok());
        assert!(validate_path("a-b/c_d/E9").is_ok());
    }

    #[test]
    fn test_invalid_paths() {
        for bad in [
            "",
            "documents/../etc",
            "a//b",
            "with space",
            "dots.not.allowed",
            "/leading",
            "trailing/",
            "uni\u{e9}code",
        ] {
            assert!(
                matches!(validate_path(bad), Err(Error::InvalidPath(_))),
                "{:?} should be rejected",
                bad
            );
        }
    }

    #[test]
    fn test_file_base_name() {
        assert_eq!(file_base_name("test.txt").unwrap(), "test.txt");
        assert_eq!(file_base_name("/tmp/upload/test.txt").unwrap(), "test.txt");
        assert_eq!(file_base_name("C:\\docs\\report.pdf").unwrap(), "report.pdf");
        assert!(matches!(
            file_base_name("dir/"),
            Err(Error::InvalidFileName(_))
        ));
        assert!(file_base_name("..").is_err());
        assert!(file_base_name("").is_err());
    }

    #[test]
    fn test_split_file_path() {
        assert_eq!(
            split_file_path("documents/test/test.txt"),
            ("documents/test", "test.txt")
        );
        assert_eq!(split_file_path("test.txt"), ("", "test.txt"));
    }
}
