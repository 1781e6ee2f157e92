use tempfile::TempDir;
use tollgate::SecurityError;
use tollgate::security::PathSandbox;

fn sandbox() -> (TempDir, PathSandbox) {
    let dir = TempDir::new().unwrap();
    let sandbox = PathSandbox::new(dir.path()).unwrap();
    (dir, sandbox)
}

#[test]
fn relative_paths_resolve_inside_the_root() {
    let (_dir, sandbox) = sandbox();
    let resolved = sandbox.validate("docs/./plan.md").unwrap();
    assert!(resolved.starts_with(sandbox.root()));
    assert!(resolved.ends_with("docs/plan.md"));
}

#[test]
fn traversal_and_home_paths_are_rejected() {
    let (_dir, sandbox) = sandbox();
    for path in ["../secret", "a/../../b", "~/.ssh/id_rsa", "bad\0name"] {
        assert!(
            matches!(sandbox.validate(path), Err(SecurityError::PathTraversal { .. })),
            "{path}"
        );
    }
}

#[test]
fn absolute_paths_outside_the_root_are_rejected() {
    let (_dir, sandbox) = sandbox();
    assert!(matches!(
        sandbox.validate("/etc/passwd"),
        Err(SecurityError::OutsideSandbox { .. })
    ));
}

#[cfg(unix)]
#[test]
fn symlinks_pointing_outside_are_rejected() {
    let (dir, sandbox) = sandbox();
    let outside = TempDir::new().unwrap();
    std::fs::write(outside.path().join("secret.txt"), "s").unwrap();
    std::os::unix::fs::symlink(outside.path(), dir.path().join("link")).unwrap();

    assert!(matches!(
        sandbox.validate("link/secret.txt"),
        Err(SecurityError::OutsideSandbox { .. })
    ));
}

#[test]
fn reads_enforce_size_and_text_checks() {
    let dir = TempDir::new().unwrap();
    let sandbox = PathSandbox::new(dir.path()).unwrap().with_max_file_size(8);
    std::fs::write(dir.path().join("small.txt"), "tiny").unwrap();
    std::fs::write(dir.path().join("large.txt"), "far too large").unwrap();
    std::fs::write(dir.path().join("blob.bin"), [0u8, 1, 2]).unwrap();
    std::fs::create_dir(dir.path().join("sub")).unwrap();

    assert!(sandbox.validate_read("small.txt").is_ok());
    assert!(matches!(
        sandbox.validate_read("large.txt"),
        Err(SecurityError::FileTooLarge { size: 13, limit: 8 })
    ));
    assert!(matches!(
        sandbox.validate_read("blob.bin"),
        Err(SecurityError::BinaryContent { .. })
    ));
    assert!(matches!(
        sandbox.validate_read("sub"),
        Err(SecurityError::NotAFile { .. })
    ));
}
