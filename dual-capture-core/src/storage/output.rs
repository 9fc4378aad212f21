use std::fs;
use std::io::ErrorKind;
use std::path::Path;

/// Create `path` (and any missing parents). An existing directory is success.
pub fn create_output_directory(path: &Path) -> bool {
    match fs::create_dir_all(path) {
        Ok(()) => true,
        Err(e) if e.kind() == ErrorKind::AlreadyExists && path.is_dir() => true,
        Err(e) => {
            log::error!("Failed to create output directory {}: {}", path.display(), e);
            false
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn creating_twice_succeeds() {
        let dir = std::env::temp_dir().join(format!("dual_capture_out_{}", std::process::id())).join("nested");
        assert!(create_output_directory(&dir));
        assert!(create_output_directory(&dir));
        assert!(dir.is_dir());
        fs::remove_dir_all(dir.parent().unwrap()).ok();
    }

    #[test]
    fn path_occupied_by_file_fails() {
        let file = std::env::temp_dir().join(format!("dual_capture_out_file_{}", std::process::id()));
        fs::write(&file, b"x").unwrap();
        assert!(!create_output_directory(&file));
        fs::remove_file(&file).ok();
    }
}
